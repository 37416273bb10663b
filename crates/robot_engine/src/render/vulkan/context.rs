//! Vulkan context: instance, adapter selection, and logical device
//!
//! Adapter suitability is computed over plain [`AdapterProfile`] data so the
//! selection rules stay testable without a live driver.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No enumerated adapter satisfied the suitability requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// No memory type matched the requested filter and property flags
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// No depth format with the required tiling features
    #[error("No supported depth format found")]
    NoSupportedDepthFormat,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Graphics/present capabilities of a single queue family, as plain data.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilySupport {
    /// The family exposes a graphics-capable queue.
    pub supports_graphics: bool,
    /// The family can present to the target surface.
    pub supports_present: bool,
}

/// Indices of the queue families selected for rendering and presentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    /// Graphics-capable family, if one was found.
    pub graphics: Option<u32>,
    /// Present-capable family, if one was found.
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both required families have been found (they may coincide).
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// First-fit search over the family list; stops as soon as both
    /// indices are assigned.
    pub fn find(families: &[QueueFamilySupport]) -> Self {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if family.supports_graphics && indices.graphics.is_none() {
                indices.graphics = Some(index);
            }
            if family.supports_present && indices.present.is_none() {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        indices
    }
}

/// Everything adapter suitability depends on, captured as plain data.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    /// Per-family graphics/present support.
    pub queue_families: Vec<QueueFamilySupport>,
    /// The swapchain device extension is available.
    pub has_swapchain_extension: bool,
    /// Number of surface formats the adapter reports for the surface.
    pub surface_format_count: usize,
    /// Number of present modes the adapter reports for the surface.
    pub present_mode_count: usize,
}

impl AdapterProfile {
    /// Queue family indices chosen for this adapter.
    pub fn queue_indices(&self) -> QueueFamilyIndices {
        QueueFamilyIndices::find(&self.queue_families)
    }

    /// Suitability: complete queue families, swapchain extension, and a
    /// non-empty format and present-mode list.
    pub fn is_suitable(&self) -> bool {
        self.queue_indices().is_complete()
            && self.has_swapchain_extension
            && self.surface_format_count > 0
            && self.present_mode_count > 0
    }
}

/// Index of the first suitable adapter in enumeration order.
pub fn first_suitable(profiles: &[AdapterProfile]) -> Option<usize> {
    profiles.iter().position(AdapterProfile::is_suitable)
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create the instance with the window system's required extensions.
    /// Validation layers and a debug messenger are enabled in debug builds.
    pub fn new(window: &Window, app_name: &str) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}"))
        })?;

        let app_name_cstr = CString::new(app_name).unwrap();
        let engine_name_cstr = CString::new("robot_engine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
        })?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        extensions.push(DebugUtils::name().as_ptr());

        let layer_names: Vec<CString> = if cfg!(debug_assertions) {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(messenger))
        };

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected physical device and its capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, used for allocation decisions
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Enumerate adapters and pick the first suitable one, in enumeration
    /// order. Fails when no adapter qualifies.
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let profiles: Vec<AdapterProfile> = devices
            .iter()
            .map(|&device| Self::profile(instance, device, surface, surface_loader))
            .collect::<VulkanResult<_>>()?;

        let index = first_suitable(&profiles).ok_or(VulkanError::NoSuitableGpu)?;
        let device = devices[index];
        let indices = profiles[index].queue_indices();

        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(device) };

        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
        });

        Ok(Self {
            device,
            properties,
            memory_properties,
            graphics_family: indices.graphics.unwrap(),
            present_family: indices.present.unwrap(),
        })
    }

    /// Capture one adapter's suitability inputs as plain data.
    fn profile(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<AdapterProfile> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut queue_families = Vec::with_capacity(families.len());
        for (index, family) in families.iter().enumerate() {
            let supports_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index as u32, surface)
                    .map_err(VulkanError::Api)?
            };
            queue_families.push(QueueFamilySupport {
                supports_graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                supports_present,
            });
        }

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain_extension = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });

        let surface_format_count = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
                .len()
        };
        let present_mode_count = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
                .len()
        };

        Ok(AdapterProfile {
            queue_families,
            has_swapchain_extension,
            surface_format_count,
            present_mode_count,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family.
    /// Duplicate queue-family entries are a validation error, so the
    /// present family is only requested when it differs from graphics.
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut unique_families = vec![physical.graphics_family];
        if physical.present_family != physical.graphics_family {
            unique_families.push(physical.present_family);
        }

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Owns the instance, surface, and devices for the renderer's lifetime.
///
/// Field order matters: the logical device is destroyed before the surface
/// and instance, and the explicit `Drop` destroys the surface first.
pub struct VulkanContext {
    /// Selected physical device information
    pub physical: PhysicalDeviceInfo,
    /// Logical device and its queues
    pub device: LogicalDevice,
    /// Presentation surface
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Vulkan instance
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Bring up instance, surface, adapter, and logical device for `window`.
    pub fn new(window: &mut Window, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        let physical = PhysicalDeviceInfo::select(&instance.instance, surface, &surface_loader)?;
        let device = LogicalDevice::new(&instance.instance, &physical)?;

        Ok(Self {
            physical,
            device,
            surface,
            surface_loader,
            instance,
        })
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport {
            supports_graphics: graphics,
            supports_present: present,
        }
    }

    fn suitable_profile() -> AdapterProfile {
        AdapterProfile {
            queue_families: vec![family(true, true)],
            has_swapchain_extension: true,
            surface_format_count: 2,
            present_mode_count: 1,
        }
    }

    #[test]
    fn queue_search_finds_shared_family() {
        let indices = QueueFamilyIndices::find(&[family(false, false), family(true, true)]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn queue_search_allows_distinct_families() {
        let indices = QueueFamilyIndices::find(&[family(true, false), family(false, true)]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn queue_search_keeps_first_match() {
        // Later families must not displace the first hit.
        let indices =
            QueueFamilyIndices::find(&[family(true, true), family(true, true), family(true, true)]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn queue_search_incomplete_without_present() {
        let indices = QueueFamilyIndices::find(&[family(true, false)]);
        assert!(!indices.is_complete());
        assert_eq!(indices.present, None);
    }

    #[test]
    fn suitability_requires_every_conjunct() {
        assert!(suitable_profile().is_suitable());

        let mut missing_extension = suitable_profile();
        missing_extension.has_swapchain_extension = false;
        assert!(!missing_extension.is_suitable());

        let mut no_formats = suitable_profile();
        no_formats.surface_format_count = 0;
        assert!(!no_formats.is_suitable());

        let mut no_present_modes = suitable_profile();
        no_present_modes.present_mode_count = 0;
        assert!(!no_present_modes.is_suitable());

        let mut no_queues = suitable_profile();
        no_queues.queue_families = vec![family(false, true)];
        assert!(!no_queues.is_suitable());
    }

    #[test]
    fn selection_takes_first_suitable_in_order() {
        let mut unsuitable = suitable_profile();
        unsuitable.present_mode_count = 0;
        let profiles = vec![unsuitable, suitable_profile(), suitable_profile()];
        assert_eq!(first_suitable(&profiles), Some(1));
    }

    #[test]
    fn selection_fails_deterministically_when_none_qualify() {
        let mut unsuitable = suitable_profile();
        unsuitable.has_swapchain_extension = false;
        assert_eq!(first_suitable(&[unsuitable]), None);
        assert_eq!(first_suitable(&[]), None);
    }
}
