//! Texture images: staged upload, layout transitions, view, and sampler

use ash::{vk, Device};

use crate::render::vulkan::buffer::{find_memory_type, Uploader};
use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Sampled 2D texture with its backing memory, view, and sampler.
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
}

impl Texture {
    /// Upload RGBA8 pixel data into a device-local sampled image.
    ///
    /// The pixels travel through a host-visible staging buffer; the image is
    /// transitioned to `TRANSFER_DST_OPTIMAL` for the copy and to
    /// `SHADER_READ_ONLY_OPTIMAL` afterwards. The staging buffer is
    /// destroyed as soon as the copy submission has drained.
    pub fn from_rgba(
        uploader: &Uploader,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture data is {} bytes, expected {} for {}x{} RGBA",
                    pixels.len(),
                    expected,
                    width,
                    height
                ),
            });
        }

        let device = uploader.device().clone();
        let format = vk::Format::R8G8B8A8_UNORM;
        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match find_memory_type(
            uploader.memory_properties(),
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_image_memory(image, memory, 0) {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        let upload = Self::upload_pixels(uploader, image, extent, pixels);
        if let Err(e) = upload {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(e);
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let image_view = unsafe {
            match device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(16.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        let sampler = unsafe {
            match device.create_sampler(&sampler_info, None) {
                Ok(sampler) => sampler,
                Err(e) => {
                    device.destroy_image_view(image_view, None);
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        Ok(Self {
            device,
            image,
            memory,
            image_view,
            sampler,
        })
    }

    /// Stage pixels and record transition + copy + transition in one
    /// submission.
    fn upload_pixels(
        uploader: &Uploader,
        image: vk::Image,
        extent: vk::Extent2D,
        pixels: &[u8],
    ) -> VulkanResult<()> {
        let staging = uploader.create_staging(pixels)?;
        let device = uploader.device();

        let commands = uploader.one_time_commands()?;
        let buffer = commands.buffer();

        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

        unsafe {
            device.cmd_pipeline_barrier(
                buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer.build()],
            );
        }

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        unsafe {
            device.cmd_copy_buffer_to_image(
                buffer,
                staging.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }

        let to_shader = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ);

        unsafe {
            device.cmd_pipeline_barrier(
                buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader.build()],
            );
        }

        commands.submit()
        // `staging` drops here, after the copy has completed.
    }

    /// Image view for descriptor writes
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Sampler for descriptor writes
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // Sampler and view before the image, image before its memory.
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
