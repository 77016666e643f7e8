//! Framebuffer management

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a single-layer framebuffer over `attachments`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device.create_framebuffer(&framebuffer_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Create one framebuffer per swapchain image view
    pub fn for_each_view(
        device: &Device,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<Self>> {
        views
            .iter()
            .map(|&view| Self::new(device.clone(), render_pass, &[view], extent))
            .collect()
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
