use ash::vk;

use crate::core::PresentModePreference;
use crate::render::renderer::defer_zero_area;
use crate::render::frame::{AcquiredImage, FrameBackend, FrameOutcome, FrameScheduler, SlotState};
use crate::render::vulkan::{QueueFamilyIndices, QueueFamilySupport, SwapchainPlan, VulkanError, VulkanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Wait(usize),
    Acquire(usize, u32),
    Reset(usize),
    Record(usize, u32),
    Submit(usize),
    Present(usize, u32),
    Recreate,
}

/// Device simulation: submissions stay pending until their fence is waited
/// on (or the device idles for a recreation), so the number of outstanding
/// submissions is observable.
struct SimulatedDevice {
    image_count: u32,
    next_image: u32,
    /// Drawable size the window reports
    extent: (u32, u32),
    /// Extent the surface capabilities report; lags the window on resize
    surface_extent: (u32, u32),
    pending: Vec<bool>,
    signaled: Vec<bool>,
    max_pending: usize,
    events: Vec<Event>,
    acquired: Option<u32>,
    out_of_date_acquires: usize,
    out_of_date_presents: usize,
    suboptimal_acquires: usize,
    recreations: usize,
}

impl SimulatedDevice {
    fn new(frames_in_flight: usize, image_count: u32) -> Self {
        Self {
            image_count,
            next_image: 0,
            extent: (640, 480),
            surface_extent: (640, 480),
            pending: vec![false; frames_in_flight],
            // Fences start signaled
            signaled: vec![true; frames_in_flight],
            max_pending: 0,
            events: Vec::new(),
            acquired: None,
            out_of_date_acquires: 0,
            out_of_date_presents: 0,
            suboptimal_acquires: 0,
            recreations: 0,
        }
    }

    fn pending_count(&self) -> usize {
        self.pending.iter().filter(|&&p| p).count()
    }

    fn submissions(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, Event::Submit(_))).count()
    }

    fn presented_images(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Present(_, image) => Some(*image),
                _ => None,
            })
            .collect()
    }

    fn recorded_slots(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Record(slot, _) => Some(*slot),
                _ => None,
            })
            .collect()
    }

    fn complete_all(&mut self) {
        for slot in 0..self.pending.len() {
            if self.pending[slot] {
                self.pending[slot] = false;
                self.signaled[slot] = true;
            }
        }
    }
}

impl FrameBackend for SimulatedDevice {
    type Slot = usize;

    fn wait_for_fence(&mut self, slot: &usize) -> VulkanResult<()> {
        let slot = *slot;
        if self.pending[slot] {
            self.pending[slot] = false;
            self.signaled[slot] = true;
        }
        assert!(self.signaled[slot], "waited on slot {} whose fence can never signal", slot);
        self.events.push(Event::Wait(slot));
        Ok(())
    }

    fn reset_fence(&mut self, slot: &usize) -> VulkanResult<()> {
        assert!(self.acquired.is_some(), "fence reset before an image was acquired");
        self.signaled[*slot] = false;
        self.events.push(Event::Reset(*slot));
        Ok(())
    }

    fn acquire_next_image(&mut self, slot: &usize) -> VulkanResult<AcquiredImage> {
        if self.out_of_date_acquires > 0 {
            self.out_of_date_acquires -= 1;
            return Err(VulkanError::SwapchainOutOfDate);
        }

        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.acquired = Some(image_index);
        self.events.push(Event::Acquire(*slot, image_index));

        let suboptimal = self.suboptimal_acquires > 0;
        if suboptimal {
            self.suboptimal_acquires -= 1;
        }
        Ok(AcquiredImage { image_index, suboptimal })
    }

    fn record(&mut self, slot: &usize, image_index: u32) -> VulkanResult<()> {
        let slot = *slot;
        assert!(!self.pending[slot], "slot {} recorded while its submission is in flight", slot);
        assert!(!self.signaled[slot], "slot {} recorded without resetting its fence", slot);
        assert_eq!(self.acquired, Some(image_index));
        self.events.push(Event::Record(slot, image_index));
        Ok(())
    }

    fn submit(&mut self, slot: &usize) -> VulkanResult<()> {
        self.pending[*slot] = true;
        self.max_pending = self.max_pending.max(self.pending_count());
        self.events.push(Event::Submit(*slot));
        Ok(())
    }

    fn present(&mut self, slot: &usize, image_index: u32) -> VulkanResult<()> {
        assert_eq!(self.acquired.take(), Some(image_index), "presented an image that was not acquired");
        assert_eq!(self.events.last(), Some(&Event::Submit(*slot)), "present must follow this frame's submit");

        if self.out_of_date_presents > 0 {
            self.out_of_date_presents -= 1;
            return Err(VulkanError::SwapchainOutOfDate);
        }
        self.events.push(Event::Present(*slot, image_index));
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<bool> {
        if self.extent.0 == 0 || self.extent.1 == 0 {
            return Ok(false);
        }

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: self.surface_extent.0,
                height: self.surface_extent.1,
            },
            ..Default::default()
        };
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let plan = SwapchainPlan::negotiate(
            &capabilities,
            &formats,
            &[vk::PresentModeKHR::FIFO],
            vk::Extent2D { width: self.extent.0, height: self.extent.1 },
            PresentModePreference::Fifo,
        );
        // Negotiation happens before teardown, so a deferral keeps the old chain
        if defer_zero_area(plan)?.is_none() {
            return Ok(false);
        }

        // Recreation idles the device first
        self.complete_all();
        self.next_image = 0;
        self.acquired = None;
        self.recreations += 1;
        self.events.push(Event::Recreate);
        Ok(true)
    }
}

fn scheduler(frames_in_flight: usize) -> FrameScheduler<usize> {
    FrameScheduler::new((0..frames_in_flight).collect()).unwrap()
}

#[test]
fn test_single_family_two_image_chain_alternates_slots_and_images() {
    let families = QueueFamilyIndices::resolve(&[QueueFamilySupport {
        graphics: true,
        present: true,
        transfer: true,
    }])
    .unwrap();
    assert!(families.is_combined());
    assert_eq!(families.graphics, 0);

    let capabilities = vk::SurfaceCapabilitiesKHR {
        min_image_count: 1,
        max_image_count: 0,
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        ..Default::default()
    };
    let formats = [vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }];
    let plan = SwapchainPlan::negotiate(
        &capabilities,
        &formats,
        &[vk::PresentModeKHR::FIFO],
        vk::Extent2D { width: 640, height: 480 },
        PresentModePreference::Fifo,
    )
    .unwrap();
    assert_eq!(plan.image_count, 2);
    assert_eq!(plan.extent, vk::Extent2D { width: 640, height: 480 });

    let mut device = SimulatedDevice::new(2, plan.image_count);
    let mut frames = scheduler(2);

    for _ in 0..10 {
        let outcome = frames.draw_frame(&mut device).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { swapchain_recreated: false, .. }));
    }

    assert_eq!(device.recorded_slots(), vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    assert_eq!(device.presented_images(), vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    assert_eq!(device.submissions(), 10);
    assert_eq!(frames.stats().frames_presented, 10);
    assert!(device.max_pending <= 2);
}

#[test]
fn test_out_of_date_acquire_skips_submission_and_resumes() {
    let mut device = SimulatedDevice::new(2, 3);
    let mut frames = scheduler(2);

    for _ in 0..4 {
        frames.draw_frame(&mut device).unwrap();
    }
    assert_eq!(frames.current_frame(), 0);

    // Fifth cycle: the surface changed underneath the chain
    device.out_of_date_acquires = 1;
    let submitted_before = device.submissions();
    let outcome = frames.draw_frame(&mut device).unwrap();

    assert_eq!(outcome, FrameOutcome::Recreated);
    assert_eq!(device.submissions(), submitted_before);
    assert_eq!(device.recreations, 1);
    assert_eq!(frames.current_frame(), 0, "frame index must not advance without a submission");
    assert_eq!(frames.slot_state(0), Some(SlotState::Idle));

    // Sixth cycle renders normally on the rebuilt chain
    let outcome = frames.draw_frame(&mut device).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Presented { image_index: 0, swapchain_recreated: false }
    );
    assert_eq!(device.submissions(), submitted_before + 1);
    assert_eq!(frames.current_frame(), 1);
}

#[test]
fn test_fence_survives_out_of_date_acquire() {
    let mut device = SimulatedDevice::new(1, 2);
    let mut frames = scheduler(1);

    device.out_of_date_acquires = 1;
    frames.draw_frame(&mut device).unwrap();

    // The fence was never reset, so the next wait returns immediately
    assert!(device.signaled[0]);
    assert!(!device.events.contains(&Event::Reset(0)));
    frames.draw_frame(&mut device).unwrap();
    assert_eq!(device.submissions(), 1);
}

#[test]
fn test_in_flight_submissions_never_exceed_ring_size() {
    for frames_in_flight in 1..=4 {
        let mut device = SimulatedDevice::new(frames_in_flight, 3);
        let mut frames = scheduler(frames_in_flight);

        for _ in 0..25 {
            frames.draw_frame(&mut device).unwrap();
            assert!(frames.in_flight_count() <= frames_in_flight);
        }

        assert_eq!(device.max_pending, frames_in_flight);
        assert_eq!(device.submissions(), 25);
    }
}

#[test]
fn test_each_frame_runs_wait_acquire_reset_record_submit_present() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    frames.draw_frame(&mut device).unwrap();
    frames.draw_frame(&mut device).unwrap();

    assert_eq!(
        device.events,
        vec![
            Event::Wait(0),
            Event::Acquire(0, 0),
            Event::Reset(0),
            Event::Record(0, 0),
            Event::Submit(0),
            Event::Present(0, 0),
            Event::Wait(1),
            Event::Acquire(1, 1),
            Event::Reset(1),
            Event::Record(1, 1),
            Event::Submit(1),
            Event::Present(1, 1),
        ]
    );
}

#[test]
fn test_suboptimal_acquire_still_presents_then_recreates() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    device.suboptimal_acquires = 1;
    let outcome = frames.draw_frame(&mut device).unwrap();

    assert_eq!(
        outcome,
        FrameOutcome::Presented { image_index: 0, swapchain_recreated: true }
    );
    assert_eq!(device.events.last(), Some(&Event::Recreate));
    assert_eq!(frames.current_frame(), 1);
    assert_eq!(frames.stats().recreations, 1);
}

#[test]
fn test_out_of_date_present_recreates_after_advancing() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    device.out_of_date_presents = 1;
    let outcome = frames.draw_frame(&mut device).unwrap();

    assert_eq!(outcome, FrameOutcome::Recreated);
    assert_eq!(device.submissions(), 1);
    assert!(device.presented_images().is_empty());
    assert_eq!(frames.current_frame(), 1);
    assert_eq!(frames.stats().frames_presented, 0);

    frames.draw_frame(&mut device).unwrap();
    assert_eq!(device.presented_images(), vec![0]);
}

#[test]
fn test_repeated_resize_requests_recreate_once_per_frame() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    frames.request_recreation();
    frames.request_recreation();
    frames.draw_frame(&mut device).unwrap();
    frames.draw_frame(&mut device).unwrap();

    assert_eq!(device.recreations, 1);
    assert_eq!(device.submissions(), 2);
}

#[test]
fn test_minimised_surface_skips_frames_until_restored() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    frames.draw_frame(&mut device).unwrap();

    device.extent = (0, 0);
    frames.request_recreation();
    for _ in 0..3 {
        assert_eq!(frames.draw_frame(&mut device).unwrap(), FrameOutcome::Skipped);
    }
    assert!(frames.recreation_pending());
    assert_eq!(device.submissions(), 1);
    assert_eq!(frames.stats().frames_skipped, 3);

    device.extent = (800, 600);
    let outcome = frames.draw_frame(&mut device).unwrap();
    assert!(matches!(outcome, FrameOutcome::Presented { .. }));
    assert!(!frames.recreation_pending());
    assert_eq!(device.recreations, 1);
}

#[test]
fn test_zero_area_surface_after_out_of_date_acquire_defers_without_failing() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    frames.draw_frame(&mut device).unwrap();

    // The window still reports its old size but the surface is already minimised
    device.out_of_date_acquires = 1;
    device.surface_extent = (0, 0);
    let outcome = frames.draw_frame(&mut device);

    assert!(matches!(outcome, Ok(FrameOutcome::Skipped)), "got {:?}", outcome);
    assert!(frames.recreation_pending());
    assert_eq!(device.submissions(), 1);
    assert_eq!(device.recreations, 0);
    assert_eq!(frames.stats().frames_skipped, 1);
    assert_eq!(frames.current_frame(), 1);

    // Still minimised: the pending recreation keeps deferring
    assert_eq!(frames.draw_frame(&mut device).unwrap(), FrameOutcome::Skipped);
    assert_eq!(frames.stats().frames_skipped, 2);

    device.surface_extent = (640, 480);
    let outcome = frames.draw_frame(&mut device).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Presented { image_index: 0, swapchain_recreated: false }
    );
    assert!(!frames.recreation_pending());
    assert_eq!(device.recreations, 1);
    assert_eq!(device.submissions(), 2);
}

#[test]
fn test_deferred_recreation_after_out_of_date_present_counts_skip() {
    let mut device = SimulatedDevice::new(2, 2);
    let mut frames = scheduler(2);

    device.out_of_date_presents = 1;
    device.surface_extent = (0, 0);
    let outcome = frames.draw_frame(&mut device).unwrap();

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(device.submissions(), 1);
    assert_eq!(frames.current_frame(), 1);
    assert!(frames.recreation_pending());

    let stats = frames.stats();
    assert_eq!(stats.frames_submitted, 1);
    assert_eq!(stats.frames_presented, 0);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.recreations, 0);

    device.surface_extent = (640, 480);
    assert!(matches!(frames.draw_frame(&mut device).unwrap(), FrameOutcome::Presented { .. }));
    assert_eq!(frames.stats().recreations, 1);
}

#[test]
fn test_fatal_acquire_error_propagates() {
    struct LostDevice;

    impl FrameBackend for LostDevice {
        type Slot = usize;

        fn wait_for_fence(&mut self, _slot: &usize) -> VulkanResult<()> {
            Ok(())
        }
        fn reset_fence(&mut self, _slot: &usize) -> VulkanResult<()> {
            unreachable!()
        }
        fn acquire_next_image(&mut self, _slot: &usize) -> VulkanResult<AcquiredImage> {
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        }
        fn record(&mut self, _slot: &usize, _image_index: u32) -> VulkanResult<()> {
            unreachable!()
        }
        fn submit(&mut self, _slot: &usize) -> VulkanResult<()> {
            unreachable!()
        }
        fn present(&mut self, _slot: &usize, _image_index: u32) -> VulkanResult<()> {
            unreachable!()
        }
        fn recreate_swapchain(&mut self) -> VulkanResult<bool> {
            unreachable!()
        }
    }

    let mut frames = scheduler(2);
    let result = frames.draw_frame(&mut LostDevice);

    match result {
        Err(e) => assert!(e.is_fatal()),
        Ok(outcome) => panic!("expected device loss, got {:?}", outcome),
    }
    assert_eq!(frames.slot_state(0), Some(SlotState::Idle));
    assert_eq!(frames.current_frame(), 0);
}
