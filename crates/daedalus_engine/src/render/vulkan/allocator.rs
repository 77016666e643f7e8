//! Device memory allocation
//!
//! [`MemoryAllocator`] is the narrow allocate/map/free service buffers are
//! built on. [`VmaAllocator`] implements it with the Vulkan Memory Allocator.

use ash::vk;
use vk_mem::Alloc;

use crate::render::vulkan::{GraphicsContext, VulkanError, VulkanResult};

/// Allocate-and-bind, map/unmap and free for host-visible buffers
pub trait MemoryAllocator {
    /// Opaque per-buffer allocation record
    type Allocation;

    /// Create a buffer of `size` bytes bound to fresh host-visible memory
    fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<(vk::Buffer, Self::Allocation)>;

    /// Map the allocation; the pointer is valid for its full size until `unmap`
    fn map(&self, allocation: &mut Self::Allocation) -> VulkanResult<*mut u8>;

    /// Undo a successful `map`
    fn unmap(&self, allocation: &mut Self::Allocation);

    /// Destroy the buffer and release its memory
    fn free(&self, buffer: vk::Buffer, allocation: Self::Allocation);
}

/// VMA-backed allocator
///
/// Must be dropped after every buffer it allocated and before the device.
pub struct VmaAllocator {
    allocator: vk_mem::Allocator,
}

impl VmaAllocator {
    /// Create an allocator for the context's device
    pub fn new(context: &GraphicsContext) -> VulkanResult<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(
            context.instance(),
            context.device(),
            context.physical_device(),
        );

        let allocator = vk_mem::Allocator::new(create_info)
            .map_err(|e| VulkanError::Allocation(format!("Failed to create allocator: {:?}", e)))?;

        log::debug!("VMA allocator created");
        Ok(Self { allocator })
    }
}

impl MemoryAllocator for VmaAllocator {
    type Allocation = vk_mem::Allocation;

    fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<(vk::Buffer, Self::Allocation)> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };

        unsafe {
            self.allocator
                .create_buffer(&buffer_info, &allocation_info)
                .map_err(|e| VulkanError::Allocation(format!("{} byte buffer: {:?}", size, e)))
        }
    }

    fn map(&self, allocation: &mut Self::Allocation) -> VulkanResult<*mut u8> {
        unsafe {
            self.allocator
                .map_memory(allocation)
                .map_err(|e| VulkanError::Allocation(format!("Map failed: {:?}", e)))
        }
    }

    fn unmap(&self, allocation: &mut Self::Allocation) {
        unsafe { self.allocator.unmap_memory(allocation) };
    }

    fn free(&self, buffer: vk::Buffer, mut allocation: Self::Allocation) {
        unsafe { self.allocator.destroy_buffer(buffer, &mut allocation) };
    }
}
