//! Command buffer management
//!
//! A resettable command pool plus a recorder that tracks begin/end state and
//! scopes render passes with a guard that ends the pass on drop.

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device.create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate `count` primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device.allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every buffer allocated from the pool
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Records one command buffer from reset to end
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer that is not pending execution
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Discard previous contents and begin recording
    pub fn reset_and_begin(&mut self) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin an inline render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// Finish recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe {
            self.device.end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }
}

/// Open render pass scope
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl<'a> ActiveRenderPass<'a> {
    /// Set the dynamic viewport
    pub fn set_viewport(&mut self, viewport: &vk::Viewport) {
        unsafe {
            self.recorder.device.cmd_set_viewport(
                self.recorder.command_buffer,
                0,
                &[*viewport],
            );
        }
    }

    /// Set the dynamic scissor
    pub fn set_scissor(&mut self, scissor: &vk::Rect2D) {
        unsafe {
            self.recorder.device.cmd_set_scissor(
                self.recorder.command_buffer,
                0,
                &[*scissor],
            );
        }
    }

    /// Bind a graphics pipeline
    pub fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind one vertex buffer at binding 0
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(self.recorder.command_buffer, 0, &[buffer], &[0]);
        }
    }

    /// Bind an index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(self.recorder.command_buffer, buffer, 0, index_type);
        }
    }

    /// Draw one instance of `index_count` indices
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.recorder.device.cmd_draw_indexed(self.recorder.command_buffer, index_count, 1, 0, 0, 0);
        }
    }
}

impl<'a> Drop for ActiveRenderPass<'a> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
