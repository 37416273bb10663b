//! Descriptor set layout, pool, and per-mesh set allocation
//!
//! Every mesh gets one set binding the shared camera uniform buffer and the
//! mesh's own texture. Sets are returned to the pool implicitly when the
//! pool is destroyed.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::texture::Texture;

/// Set layout: binding 0 uniform buffer (vertex stage), binding 1 combined
/// image sampler (fragment stage).
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Create the shared set layout.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::VERTEX,
                ..Default::default()
            },
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            },
        ];

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        let layout = unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, layout })
    }

    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sized so every mesh slot can hold a descriptor set.
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool able to serve `max_sets` mesh descriptor sets.
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: max_sets,
            },
        ];

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe {
            device
                .create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, pool })
    }

    /// Allocate a set and write the uniform buffer plus the mesh texture
    /// into it.
    pub fn allocate_set(
        &self,
        layout: &DescriptorSetLayout,
        uniform_buffer: vk::Buffer,
        uniform_range: vk::DeviceSize,
        texture: &Texture,
    ) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let set = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };

        let buffer_info = vk::DescriptorBufferInfo {
            buffer: uniform_buffer,
            offset: 0,
            range: uniform_range,
        };
        let image_info = vk::DescriptorImageInfo {
            sampler: texture.sampler(),
            image_view: texture.image_view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        let buffer_infos = [buffer_info];
        let image_infos = [image_info];
        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos)
                .build(),
        ];

        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
        }

        Ok(set)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // Frees every set allocated from the pool.
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
