//! Buffers, memory-type selection, and the staged upload path
//!
//! Every GPU-visible buffer is device local; CPU data reaches it through an
//! ephemeral host-visible staging buffer and a one-time copy submission.

use ash::{vk, Device};
use bytemuck::Pod;
use std::mem;

use crate::render::vulkan::commands::OneTimeCommands;
use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// First memory type whose filter bit is set and whose property flags are a
/// superset of the requested flags.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// Buffer plus its backing memory, with RAII cleanup.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer: describe, query requirements, allocate matching
    /// memory, bind.
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
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
                    device.destroy_buffer(buffer, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Map the whole buffer, copy `bytes` in, unmap. Only valid for
    /// host-visible memory.
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocation size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Staged-upload context: everything needed to move CPU data into
/// device-local resources through one-time command submissions.
#[derive(Clone)]
pub struct Uploader {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
}

impl Uploader {
    /// Build an uploader over the renderer's transfer resources.
    pub fn new(
        device: Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
    ) -> Self {
        Self {
            device,
            memory_properties,
            command_pool,
            queue,
        }
    }

    /// Logical device this uploader records on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Adapter memory types used for allocation decisions
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Create a host-visible, host-coherent staging buffer holding `bytes`.
    pub fn create_staging(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        let staging = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Create a device-local buffer initialized with `bytes` via staging.
    /// The staging buffer is destroyed once the copy has completed.
    pub fn create_device_local(
        &self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Buffer> {
        let staging = self.create_staging(bytes)?;

        let buffer = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            bytes.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.copy_buffer(&staging, &buffer, bytes.len() as vk::DeviceSize)?;
        Ok(buffer)
    }

    /// Staged update of an existing device-local buffer.
    pub fn write_device_local(&self, dst: &Buffer, bytes: &[u8]) -> VulkanResult<()> {
        let staging = self.create_staging(bytes)?;
        self.copy_buffer(&staging, dst, bytes.len() as vk::DeviceSize)
    }

    /// Record and submit a one-time buffer copy, blocking until the
    /// transfer queue is idle.
    fn copy_buffer(&self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let commands = OneTimeCommands::begin(self.device.clone(), self.command_pool, self.queue)?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(commands.buffer(), src.handle(), dst.handle(), &[region]);
        }

        commands.submit()
    }

    /// One-time command scope on this uploader's pool and queue.
    pub fn one_time_commands(&self) -> VulkanResult<OneTimeCommands> {
        OneTimeCommands::begin(self.device.clone(), self.command_pool, self.queue)
    }
}

/// Device-local vertex buffer.
pub struct VertexBuffer {
    buffer: Buffer,
}

impl VertexBuffer {
    /// Upload `vertices` into a device-local vertex buffer.
    pub fn new<T: Pod>(uploader: &Uploader, vertices: &[T]) -> VulkanResult<Self> {
        let buffer = uploader.create_device_local(
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        Ok(Self { buffer })
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Device-local index buffer with its element count.
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload `indices` into a device-local index buffer.
    pub fn new(uploader: &Uploader, indices: &[u32]) -> VulkanResult<Self> {
        let buffer = uploader.create_device_local(
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices in the buffer
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Device-local uniform buffer, updated through the staged path.
pub struct UniformBuffer<T> {
    buffer: Buffer,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Allocate the device-local buffer sized for `T`.
    pub fn new(uploader: &Uploader) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            uploader.device().clone(),
            uploader.memory_properties(),
            mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        Ok(Self {
            buffer,
            _marker: std::marker::PhantomData,
        })
    }

    /// Push new contents through an ephemeral staging buffer.
    pub fn update(&self, uploader: &Uploader, value: &T) -> VulkanResult<()> {
        uploader.write_device_local(&self.buffer, bytemuck::bytes_of(value))
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the uniform block in bytes
    pub fn range(&self) -> vk::DeviceSize {
        mem::size_of::<T>() as vk::DeviceSize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[(u32, vk::MemoryPropertyFlags)]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &(heap_index, flags)) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index,
            };
        }
        props
    }

    #[test]
    fn picks_first_matching_type() {
        let props = memory_properties(&[
            (0, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            (0, vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT),
            (0, vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT),
        ]);

        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_type_filter_bits() {
        let props = memory_properties(&[
            (0, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            (0, vk::MemoryPropertyFlags::DEVICE_LOCAL),
        ]);

        // Bit 0 excluded by the filter, so type 1 must be chosen.
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn requested_flags_must_be_subset() {
        let props = memory_properties(&[(0, vk::MemoryPropertyFlags::HOST_VISIBLE)]);

        let result = find_memory_type(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn no_match_is_an_error() {
        let props = memory_properties(&[]);
        let result = find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn superset_flags_satisfy_request() {
        let props = memory_properties(&[(
            0,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        )]);

        let index = find_memory_type(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 0);
    }
}
