//! Swapchain lifecycle
//!
//! Surface format, present mode, extent, and image count are chosen by pure
//! functions over the adapter's reported capabilities; the `Swapchain`
//! wrapper owns the handle and its image views and supports atomic
//! replacement through the `old_swapchain` mechanism.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};

use crate::render::vulkan::context::{PhysicalDeviceInfo, VulkanError, VulkanResult};

/// Fallback surface format used when the adapter expresses no preference.
pub const FALLBACK_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Choose the surface format.
///
/// A single `UNDEFINED` entry means the surface accepts anything, so the
/// fallback pair is used. Otherwise the fallback pair is preferred when
/// listed, and the first reported format is used as a last resort.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return FALLBACK_FORMAT;
    }

    formats
        .iter()
        .find(|sf| {
            sf.format == FALLBACK_FORMAT.format && sf.color_space == FALLBACK_FORMAT.color_space
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Prefer low-latency triple buffering, fall back to the always-available
/// FIFO mode.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the driver's current extent unless it is the "undefined" sentinel,
/// in which case the requested window size is clamped per axis.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Minimum plus one for headroom, clamped to the maximum (0 = unlimited).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Swapchain and its image views, with RAII cleanup.
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the surface.
    ///
    /// Pass the previous swapchain's handle as `old_swapchain` during
    /// recreation so the driver can hand over resources; the old wrapper
    /// must stay alive until this call returns and be dropped afterwards.
    pub fn new(
        instance: &Instance,
        device: Device,
        physical: &PhysicalDeviceInfo,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        requested_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let loader = SwapchainLoader::new(instance, &device);

        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical.device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical.device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical.device, surface)
                .map_err(VulkanError::Api)?
        };

        let format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, requested_extent);
        let image_count = choose_image_count(&caps);

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Images are shared between the graphics and present families when
        // they differ; exclusive ownership otherwise.
        let family_indices = [physical.graphics_family, physical.present_family];
        if physical.graphics_family != physical.present_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.create_image_view(&view_info, None) }
            })
            .collect();
        let image_views = image_views.map_err(VulkanError::Api)?;

        log::debug!(
            "Swapchain created: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Extension loader for acquire/present calls
    pub fn loader(&self) -> &SwapchainLoader {
        &self.loader
    }

    /// Chosen surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Chosen extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Views over the presentable images
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(f: vk::Format, cs: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: f,
            color_space: cs,
        }
    }

    fn caps(
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        current: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn single_undefined_format_yields_fallback() {
        let formats = [format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn preferred_format_is_picked_when_listed() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn first_format_is_fallback_of_last_resort() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn mailbox_preferred_else_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_driver_value_when_defined() {
        let caps = caps((1, 1), (4096, 4096), (1280, 720), 2, 0);
        let extent = choose_extent(&caps, vk::Extent2D { width: 640, height: 480 });
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn extent_clamps_requested_size_per_axis() {
        let caps = caps((200, 100), (800, 600), (u32::MAX, u32::MAX), 2, 0);

        let small = choose_extent(&caps, vk::Extent2D { width: 10, height: 10 });
        assert_eq!((small.width, small.height), (200, 100));

        let large = choose_extent(&caps, vk::Extent2D { width: 5000, height: 5000 });
        assert_eq!((large.width, large.height), (800, 600));

        let inside = choose_extent(&caps, vk::Extent2D { width: 640, height: 480 });
        assert_eq!((inside.width, inside.height), (640, 480));
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        let unlimited = caps((1, 1), (100, 100), (50, 50), 2, 0);
        assert_eq!(choose_image_count(&unlimited), 3);

        let capped = caps((1, 1), (100, 100), (50, 50), 2, 2);
        assert_eq!(choose_image_count(&capped), 2);

        let roomy = caps((1, 1), (100, 100), (50, 50), 3, 8);
        assert_eq!(choose_image_count(&roomy), 4);
    }
}
