//! Command pool and one-time submission helpers

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup.
///
/// Destroying the pool frees every command buffer still allocated from it,
/// after draining the device.
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for the given queue family with resettable buffers.
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers.
    pub fn allocate_primary(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        self.allocate(vk::CommandBufferLevel::PRIMARY, count)
    }

    /// Allocate one secondary command buffer.
    pub fn allocate_secondary(&self) -> VulkanResult<vk::CommandBuffer> {
        Ok(self.allocate(vk::CommandBufferLevel::SECONDARY, 1)?[0])
    }

    fn allocate(
        &self,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(level)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Return command buffers to the pool.
    pub fn free(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, buffers);
        }
    }

    /// Command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// One-shot command buffer: begin on creation, submit-and-wait on `submit`.
///
/// Used for staging copies and image layout transitions; the buffer is
/// freed once the queue has gone idle.
pub struct OneTimeCommands {
    device: Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    buffer: vk::CommandBuffer,
}

impl OneTimeCommands {
    /// Allocate and begin a one-time-submit command buffer.
    pub fn begin(device: Device, pool: vk::CommandPool, queue: vk::Queue) -> VulkanResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffer = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            if let Err(e) = device.begin_command_buffer(buffer, &begin_info) {
                device.free_command_buffers(pool, &[buffer]);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device,
            pool,
            queue,
            buffer,
        })
    }

    /// Command buffer to record into
    pub fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// End recording, submit, and block until the queue is idle.
    pub fn submit(self) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(self.buffer)
                .map_err(VulkanError::Api)?;

            let buffers = [self.buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);

            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;

            self.device
                .queue_wait_idle(self.queue)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }
}

impl Drop for OneTimeCommands {
    fn drop(&mut self) {
        unsafe {
            self.device.free_command_buffers(self.pool, &[self.buffer]);
        }
    }
}
