//! Swapchain and framebuffer management for Vulkan renderer
//!
//! Owns the presentable chain, the render pass describing its images and one
//! framebuffer per image. Recreation always idles the device first and tears
//! the old chain down completely (framebuffers, then views, then the chain
//! handle) before the new one is built.

use ash::vk;

use crate::core::PresentModePreference;
use crate::render::frame::AcquiredImage;
use crate::render::vulkan::{
    Framebuffer, GraphicsContext, RenderPass, Swapchain, SwapchainPlan, VulkanError, VulkanResult,
};

/// Manages the swapchain together with the targets derived from it
pub struct SwapchainManager {
    // Field order is drop order: framebuffers, then the chain, then the pass
    framebuffers: Vec<Framebuffer>,
    swapchain: Option<Swapchain>,
    render_pass: RenderPass,
    present_preference: PresentModePreference,
    current_image: Option<u32>,
}

impl SwapchainManager {
    /// Build the chain, render pass and framebuffers for a `width` x `height` surface
    pub fn create(
        context: &GraphicsContext,
        width: u32,
        height: u32,
        present_preference: PresentModePreference,
    ) -> VulkanResult<Self> {
        log::debug!("Creating SwapchainManager at {}x{}...", width, height);

        let plan = SwapchainPlan::query(context, vk::Extent2D { width, height }, present_preference)?;
        let swapchain = Swapchain::new(context, &plan)?;
        let render_pass = RenderPass::new_present_pass(context.device().clone(), swapchain.format().format)?;
        let framebuffers = Framebuffer::for_each_view(
            context.device(),
            render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        log::info!(
            "Swapchain ready: {} images, {}x{}, {:?}",
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.present_mode()
        );

        let manager = Self {
            framebuffers,
            swapchain: Some(swapchain),
            render_pass,
            present_preference,
            current_image: None,
        };
        manager.debug_check_lengths();
        Ok(manager)
    }

    fn chain(&self) -> VulkanResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "swapchain is being recreated".to_string(),
        })
    }

    /// Acquire the next image, signaling `signal_on_ready` when it can be rendered to.
    ///
    /// The returned index stays current until [`present`](Self::present).
    pub fn acquire_next(&mut self, signal_on_ready: vk::Semaphore) -> VulkanResult<AcquiredImage> {
        let (image_index, suboptimal) = self.chain()?.acquire_next_image(signal_on_ready)?;
        if suboptimal {
            log::warn!("Acquired image {} from a suboptimal swapchain", image_index);
        }
        self.current_image = Some(image_index);
        Ok(AcquiredImage { image_index, suboptimal })
    }

    /// Present the current image once `wait_on` is signaled.
    ///
    /// `Err(SwapchainSuboptimal)` means the image was presented but the chain
    /// should be recreated; `Err(SwapchainOutOfDate)` means it was not.
    pub fn present(&mut self, queue: vk::Queue, wait_on: vk::Semaphore) -> VulkanResult<()> {
        let image_index = self.current_image.take().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "present without a successfully acquired image".to_string(),
        })?;

        let suboptimal = self.chain()?.queue_present(queue, wait_on, image_index)?;
        if suboptimal {
            return Err(VulkanError::SwapchainSuboptimal);
        }
        Ok(())
    }

    /// Tear down and rebuild the chain for a new surface size.
    ///
    /// Returns `true` when the surface format changed, in which case the
    /// render pass was rebuilt and pipelines built against it are stale.
    /// `Err(SurfaceZeroArea)` leaves the current chain untouched.
    pub fn recreate(&mut self, context: &GraphicsContext, width: u32, height: u32) -> VulkanResult<bool> {
        log::debug!("Recreating swapchain at {}x{}...", width, height);

        context.wait_idle()?;

        // Negotiate first so a minimised surface does not cost the old chain
        let plan = SwapchainPlan::query(context, vk::Extent2D { width, height }, self.present_preference)?;

        self.current_image = None;
        self.framebuffers.clear();
        self.swapchain = None;

        let swapchain = Swapchain::new(context, &plan)?;

        let format_changed = swapchain.format().format != self.render_pass.color_format();
        if format_changed {
            log::info!(
                "Swapchain format changed {:?} -> {:?}; rebuilding render pass",
                self.render_pass.color_format(),
                swapchain.format().format
            );
            self.render_pass = RenderPass::new_present_pass(context.device().clone(), swapchain.format().format)?;
        }

        self.framebuffers = Framebuffer::for_each_view(
            context.device(),
            self.render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        self.swapchain = Some(swapchain);
        self.debug_check_lengths();

        log::debug!("Swapchain recreated with {} images", self.image_count());
        Ok(format_changed)
    }

    fn debug_check_lengths(&self) {
        if let Some(swapchain) = &self.swapchain {
            debug_assert_eq!(swapchain.images().len(), swapchain.image_views().len());
            debug_assert_eq!(swapchain.image_views().len(), self.framebuffers.len());
        }
    }

    /// Current image extent, zero while the chain is torn down
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map_or(vk::Extent2D { width: 0, height: 0 }, Swapchain::extent)
    }

    /// Negotiated image format
    pub fn format(&self) -> vk::Format {
        self.render_pass.color_format()
    }

    /// Number of images in the chain
    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    /// Index acquired this cycle, if any
    pub fn current_image(&self) -> Option<u32> {
        self.current_image
    }

    /// Render pass shared by every framebuffer
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Get framebuffer for a specific swapchain image
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for image {}", image_index),
            })
    }
}
