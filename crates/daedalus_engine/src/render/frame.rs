//! Frames-in-flight scheduling
//!
//! The scheduler owns a ring of F frame slots and drives one slot through
//! each frame:
//!
//! ```text
//! wait(fence) -> acquire -> reset(fence) -> record -> submit -> present -> advance
//! ```
//!
//! It never talks to Vulkan directly. Everything device-facing goes through
//! [`FrameBackend`], which the renderer implements over real fences and
//! queues. The ordering rules therefore live in one place:
//!
//! - a slot is only recorded after its fence was observed signaled, so at
//!   most F submissions are ever outstanding;
//! - the fence is reset only after an image was acquired, so bailing out on
//!   an out-of-date swapchain never leaves an unsignaled fence behind;
//! - an out-of-date acquire rebuilds the swapchain and ends the frame without
//!   submitting or advancing;
//! - a suboptimal or out-of-date present rebuilds the swapchain after the
//!   frame has advanced.

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Result of a successful image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index of the swapchain image to render into
    pub image_index: u32,
    /// The chain still works but should be rebuilt after this frame
    pub suboptimal: bool,
}

/// Device-facing operations the scheduler sequences
///
/// `Slot` is whatever one frame in flight owns: fence, semaphores and a
/// command buffer in the Vulkan backend.
pub trait FrameBackend {
    /// Per-frame synchronization bundle
    type Slot;

    /// Block until the slot's last submission has completed
    fn wait_for_fence(&mut self, slot: &Self::Slot) -> VulkanResult<()>;

    /// Return the slot's fence to unsignaled before it is submitted again
    fn reset_fence(&mut self, slot: &Self::Slot) -> VulkanResult<()>;

    /// Acquire the next image, signaling the slot's acquire semaphore
    fn acquire_next_image(&mut self, slot: &Self::Slot) -> VulkanResult<AcquiredImage>;

    /// Reset and re-record the slot's command buffer for `image_index`
    fn record(&mut self, slot: &Self::Slot, image_index: u32) -> VulkanResult<()>;

    /// Submit the slot's command buffer: wait on the acquire semaphore,
    /// signal the render-complete semaphore and the slot's fence
    fn submit(&mut self, slot: &Self::Slot) -> VulkanResult<()>;

    /// Present `image_index` after the slot's render-complete semaphore
    fn present(&mut self, slot: &Self::Slot, image_index: u32) -> VulkanResult<()>;

    /// Idle the device and rebuild the swapchain.
    ///
    /// `Ok(false)` means the surface currently has no area and recreation
    /// should be retried later.
    fn recreate_swapchain(&mut self) -> VulkanResult<bool>;
}

/// Where a slot is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Fence observed signaled (or never submitted); free for reuse
    Idle,
    /// Waiting on the swapchain for an image
    Acquiring,
    /// Command buffer being recorded
    Recording,
    /// Submitted; fence not yet observed signaled
    Submitted,
}

/// What one call to [`FrameScheduler::draw_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and handed to the presentation engine
    Presented {
        /// Image that was presented
        image_index: u32,
        /// The swapchain was rebuilt after presenting
        swapchain_recreated: bool,
    },
    /// The swapchain was out of date and has been rebuilt; nothing presented
    Recreated,
    /// Nothing was rendered; the surface has no area
    Skipped,
}

/// Running counters, logged at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Command buffers submitted
    pub frames_submitted: u64,
    /// Images accepted by the presentation engine
    pub frames_presented: u64,
    /// Completed swapchain rebuilds
    pub recreations: u64,
    /// Frames skipped because the surface had no area
    pub frames_skipped: u64,
}

/// Ring of frame slots and the frame protocol that cycles through them
pub struct FrameScheduler<S> {
    slots: Vec<S>,
    states: Vec<SlotState>,
    current_frame: usize,
    recreation_pending: bool,
    stats: FrameStats,
}

impl<S> FrameScheduler<S> {
    /// Take ownership of the slots; the ring size is `slots.len()`
    pub fn new(slots: Vec<S>) -> VulkanResult<Self> {
        if slots.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "frame scheduler needs at least one slot".to_string(),
            });
        }

        log::debug!("Frame scheduler created with {} frames in flight", slots.len());
        let states = vec![SlotState::Idle; slots.len()];
        Ok(Self {
            slots,
            states,
            current_frame: 0,
            recreation_pending: false,
            stats: FrameStats::default(),
        })
    }

    /// Number of slots (F)
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// State of slot `index`
    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.states.get(index).copied()
    }

    /// Slots submitted whose fences have not been observed yet
    pub fn in_flight_count(&self) -> usize {
        self.states.iter().filter(|&&state| state == SlotState::Submitted).count()
    }

    /// Running counters
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Whether a rebuild is queued for the next frame
    pub fn recreation_pending(&self) -> bool {
        self.recreation_pending
    }

    /// Rebuild the swapchain before the next frame (window resized)
    pub fn request_recreation(&mut self) {
        self.recreation_pending = true;
    }

    /// Run one frame through the protocol
    pub fn draw_frame<B>(&mut self, backend: &mut B) -> VulkanResult<FrameOutcome>
    where
        B: FrameBackend<Slot = S>,
    {
        if self.recreation_pending && !self.recreate(backend)? {
            self.stats.frames_skipped += 1;
            return Ok(FrameOutcome::Skipped);
        }

        let index = self.current_frame;
        let slot = &self.slots[index];

        backend.wait_for_fence(slot)?;
        self.states[index] = SlotState::Acquiring;
        let acquired = match backend.acquire_next_image(slot) {
            Ok(acquired) => acquired,
            Err(VulkanError::SwapchainOutOfDate) => {
                self.states[index] = SlotState::Idle;
                log::warn!("Swapchain out of date during acquire; recreating");
                return if self.recreate(backend)? {
                    Ok(FrameOutcome::Recreated)
                } else {
                    self.stats.frames_skipped += 1;
                    Ok(FrameOutcome::Skipped)
                };
            }
            Err(e) => {
                self.states[index] = SlotState::Idle;
                return Err(e);
            }
        };

        backend.reset_fence(slot)?;

        self.states[index] = SlotState::Recording;
        backend.record(slot, acquired.image_index)?;
        backend.submit(slot)?;
        self.states[index] = SlotState::Submitted;
        self.stats.frames_submitted += 1;

        let presented = backend.present(slot, acquired.image_index);
        self.current_frame = (index + 1) % self.slots.len();
        log::trace!("Frame submitted on slot {} for image {}", index, acquired.image_index);

        match presented {
            Ok(()) if !acquired.suboptimal => {
                self.stats.frames_presented += 1;
                Ok(FrameOutcome::Presented {
                    image_index: acquired.image_index,
                    swapchain_recreated: false,
                })
            }
            Ok(()) | Err(VulkanError::SwapchainSuboptimal) => {
                self.stats.frames_presented += 1;
                log::warn!("Swapchain suboptimal after present; recreating");
                let swapchain_recreated = self.recreate(backend)?;
                Ok(FrameOutcome::Presented {
                    image_index: acquired.image_index,
                    swapchain_recreated,
                })
            }
            Err(VulkanError::SwapchainOutOfDate) => {
                log::warn!("Swapchain out of date during present; recreating");
                if self.recreate(backend)? {
                    Ok(FrameOutcome::Recreated)
                } else {
                    self.stats.frames_skipped += 1;
                    Ok(FrameOutcome::Skipped)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn recreate<B>(&mut self, backend: &mut B) -> VulkanResult<bool>
    where
        B: FrameBackend<Slot = S>,
    {
        if backend.recreate_swapchain()? {
            self.recreation_pending = false;
            self.stats.recreations += 1;
            Ok(true)
        } else {
            log::debug!("Surface has no area; deferring swapchain recreation");
            self.recreation_pending = true;
            Ok(false)
        }
    }
}
