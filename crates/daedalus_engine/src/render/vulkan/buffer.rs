//! Buffer management for vertex and index data
//!
//! Buffers are filled once at creation through a synchronous
//! map/copy/unmap on host-visible memory. There is no staging path, so
//! large meshes pay for host-visible device memory; fine for the small
//! static geometry this engine draws.

use ash::vk;
use bytemuck::Pod;
use std::rc::Rc;

use crate::render::vulkan::{MemoryAllocator, VulkanError, VulkanResult};

/// Width of the elements of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Bytes per index
    pub fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Matching Vulkan index type
    pub fn to_vk(self) -> vk::IndexType {
        match self {
            Self::U16 => vk::IndexType::UINT16,
            Self::U32 => vk::IndexType::UINT32,
        }
    }
}

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// Vertex attribute data
    Vertex,
    /// Index data of the given width
    Index(IndexType),
}

impl BufferRole {
    fn usage(self) -> vk::BufferUsageFlags {
        match self {
            Self::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            Self::Index(_) => vk::BufferUsageFlags::INDEX_BUFFER,
        }
    }
}

/// Immutable device buffer, freed exactly once when dropped
pub struct GpuBuffer<A: MemoryAllocator> {
    allocator: Rc<A>,
    buffer: vk::Buffer,
    allocation: Option<A::Allocation>,
    role: BufferRole,
    size: vk::DeviceSize,
}

impl<A: MemoryAllocator> GpuBuffer<A> {
    /// Allocate a buffer for `role` and copy `data` into it
    pub fn upload(allocator: &Rc<A>, role: BufferRole, data: &[u8]) -> VulkanResult<Self> {
        if data.is_empty() {
            return Err(VulkanError::Allocation("cannot upload an empty buffer".to_string()));
        }
        if let BufferRole::Index(index_type) = role {
            if data.len() % index_type.size() != 0 {
                return Err(VulkanError::InvalidOperation {
                    reason: format!(
                        "{} bytes is not a whole number of {:?} indices",
                        data.len(),
                        index_type
                    ),
                });
            }
        }

        let size = data.len() as vk::DeviceSize;
        let (buffer, mut allocation) = allocator.allocate_buffer(size, role.usage())?;

        let mapped = match allocator.map(&mut allocation) {
            Ok(ptr) => ptr,
            Err(e) => {
                allocator.free(buffer, allocation);
                return Err(e);
            }
        };
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped, data.len());
        }
        allocator.unmap(&mut allocation);

        log::debug!("Uploaded {:?} buffer ({} bytes)", role, size);

        Ok(Self {
            allocator: Rc::clone(allocator),
            buffer,
            allocation: Some(allocation),
            role,
            size,
        })
    }

    /// Upload a slice of plain-old-data vertices
    pub fn vertices<V: Pod>(allocator: &Rc<A>, vertices: &[V]) -> VulkanResult<Self> {
        Self::upload(allocator, BufferRole::Vertex, bytemuck::cast_slice(vertices))
    }

    /// Upload 16-bit indices
    pub fn indices_u16(allocator: &Rc<A>, indices: &[u16]) -> VulkanResult<Self> {
        Self::upload(allocator, BufferRole::Index(IndexType::U16), bytemuck::cast_slice(indices))
    }

    /// Upload 32-bit indices
    pub fn indices_u32(allocator: &Rc<A>, indices: &[u32]) -> VulkanResult<Self> {
        Self::upload(allocator, BufferRole::Index(IndexType::U32), bytemuck::cast_slice(indices))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Role the buffer was uploaded for
    pub fn role(&self) -> BufferRole {
        self.role
    }

    /// Get size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Number of indices, for index buffers
    pub fn index_count(&self) -> Option<u32> {
        match self.role {
            BufferRole::Index(index_type) => Some((self.size / index_type.size() as u64) as u32),
            BufferRole::Vertex => None,
        }
    }
}

impl<A: MemoryAllocator> Drop for GpuBuffer<A> {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.allocator.free(self.buffer, allocation);
        }
    }
}
