//! Fence and semaphore wrappers for frame synchronization

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// GPU-GPU ordering signal between queue operations.
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-observable GPU completion signal.
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally in the signaled state.
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for the fence with a bounded retry on transient timeouts.
    /// Non-timeout failures are returned immediately.
    pub fn wait_retrying(&self, timeout_ns: u64, max_attempts: u32) -> VulkanResult<()> {
        for _ in 0..max_attempts {
            match unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) } {
                Ok(()) => return Ok(()),
                Err(vk::Result::TIMEOUT) => continue,
                Err(e) => return Err(VulkanError::Api(e)),
            }
        }

        Err(VulkanError::InvalidOperation {
            reason: format!("fence not signaled after {max_attempts} waits"),
        })
    }

    /// Reset to the unsignaled state.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// The single frame synchronization set, reused every frame.
///
/// The fence starts unsignaled: it is signaled by the frame's submit and
/// waited on in the same frame, so command buffers are never re-recorded
/// while the GPU still owns them.
pub struct FrameSync {
    /// Signaled when the acquired image is ready to be rendered to.
    pub image_available: Semaphore,
    /// Signaled when rendering finishes; presentation waits on it.
    pub render_finished: Semaphore,
    /// Signaled by queue submission completion.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the semaphore pair and the frame fence.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, false)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}
