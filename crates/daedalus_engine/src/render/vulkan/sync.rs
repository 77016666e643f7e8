//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, and [`FrameSync`], the bundle of
//! objects one in-flight frame slot owns.
//!
//! ## How a slot is used
//!
//! ```text
//! CPU: wait(in_flight) -> acquire(signal image_available) -> reset(in_flight)
//!      -> record(command_buffer)
//! GPU: wait(image_available) [render] signal(render_finished, in_flight)
//! PE:  wait(render_finished) [present]
//! ```
//!
//! Semaphores order GPU work against other GPU work (acquire before render,
//! render before present). The fence is the only thing the CPU blocks on: a
//! slot's command buffer is touched again only after its fence has been
//! observed signaled.
//!
//! Fences are created signaled so the very first wait on each slot returns
//! immediately. The fence is reset only after an image was acquired; resetting
//! it earlier and then bailing out on an out-of-date chain would leave an
//! unsignaled fence with no submission to signal it, and the next wait on that
//! slot would never return.

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// GPU-GPU synchronization primitive with automatic resource management
///
/// Semaphores are signaled by one operation and waited on by another:
/// - Image acquisition signals → Rendering waits
/// - Rendering signals → Presentation waits
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
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

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device.create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device.wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
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

/// Synchronization objects and command buffer of one in-flight frame slot
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
    command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    /// Create the slot's semaphores and a signaled fence around `command_buffer`
    ///
    /// The command buffer stays owned by its pool.
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
            command_buffer,
        })
    }

    /// Signaled by acquire, waited on by submit
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    /// Signaled by submit, waited on by present
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    /// Signaled when the slot's submission completes
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }

    /// Command buffer re-recorded each time the slot is used
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}
