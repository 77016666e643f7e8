//! High-level Vulkan renderer
//!
//! Ties the graphics context, swapchain manager, pipeline, geometry buffers
//! and frame slots together and exposes one call per frame. The frame
//! protocol itself lives in [`FrameScheduler`]; this module supplies the
//! Vulkan side of it through [`VulkanFrameBackend`].

use ash::vk;
use bytemuck::Pod;
use std::rc::Rc;

use crate::assets::FileLoader;
use crate::core::RendererConfig;
use crate::render::frame::{AcquiredImage, FrameBackend, FrameOutcome, FrameScheduler, FrameStats};
use crate::render::vulkan::{
    BufferRole, CommandPool, CommandRecorder, FrameSync, GpuBuffer, GraphicsContext, GraphicsPipeline,
    ShaderPair, SwapchainManager, VertexLayout, VmaAllocator, VulkanError, VulkanResult,
};
use crate::render::window::WindowSystem;

/// Indexed geometry drawn every frame
struct Mesh {
    vertices: GpuBuffer<VmaAllocator>,
    indices: GpuBuffer<VmaAllocator>,
}

/// Everything a frame records against
///
/// Field order is drop order: geometry and pipeline go before the swapchain
/// targets they were built for.
struct RenderTargets {
    mesh: Option<Mesh>,
    pipeline: GraphicsPipeline,
    swapchain: SwapchainManager,
    shaders: ShaderPair,
    vertex_layout: VertexLayout,
    clear_color: [f32; 4],
    drawable_size: (u32, u32),
}

/// Vulkan renderer with F frames in flight
pub struct Renderer {
    // Field order is drop order. Buffers, pipeline and swapchain first, then
    // the frame slots, their command pool and the allocator, device last.
    targets: RenderTargets,
    scheduler: FrameScheduler<FrameSync>,
    #[allow(dead_code)] // frees the slots' command buffers on drop
    command_pool: CommandPool,
    allocator: Rc<VmaAllocator>,
    context: GraphicsContext,
}

impl Renderer {
    /// Bring up the whole stack: context, swapchain, pipeline, frame slots.
    ///
    /// Shader bytecode is read through `loader` from the paths in `config`.
    pub fn new<W, L>(
        window: &mut W,
        config: &RendererConfig,
        loader: &L,
        vertex_layout: VertexLayout,
    ) -> VulkanResult<Self>
    where
        W: WindowSystem,
        L: FileLoader + ?Sized,
    {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        log::info!("Creating renderer for '{}'", config.application_name);

        let context = GraphicsContext::initialize(
            window,
            &config.application_name,
            config.validation_enabled(),
        )?;

        let drawable_size = window.drawable_size();
        let swapchain = SwapchainManager::create(
            &context,
            drawable_size.0,
            drawable_size.1,
            config.present_mode,
        )?;

        let shaders = ShaderPair::load(loader, &config.shaders)?;
        let pipeline = GraphicsPipeline::compile(&context, swapchain.render_pass(), &shaders, &vertex_layout)?;

        let allocator = Rc::new(VmaAllocator::new(&context)?);

        let command_pool = CommandPool::new(context.device().clone(), context.queue_families().graphics)?;
        let command_buffers = command_pool.allocate_command_buffers(config.frames_in_flight as u32)?;
        let slots = command_buffers
            .into_iter()
            .map(|command_buffer| FrameSync::new(context.device().clone(), command_buffer))
            .collect::<VulkanResult<Vec<_>>>()?;
        let scheduler = FrameScheduler::new(slots)?;

        log::info!(
            "Renderer ready on '{}' with {} frames in flight",
            context.adapter().name,
            scheduler.frames_in_flight()
        );

        Ok(Self {
            targets: RenderTargets {
                mesh: None,
                pipeline,
                swapchain,
                shaders,
                vertex_layout,
                clear_color: config.clear_color,
                drawable_size,
            },
            scheduler,
            command_pool,
            allocator,
            context,
        })
    }

    /// Replace the drawn geometry with 16-bit indexed vertices
    pub fn upload_mesh<V: Pod>(&mut self, vertices: &[V], indices: &[u16]) -> VulkanResult<()> {
        let vertex_buffer = GpuBuffer::vertices(&self.allocator, vertices)?;
        let index_buffer = GpuBuffer::indices_u16(&self.allocator, indices)?;
        self.replace_mesh(vertex_buffer, index_buffer)
    }

    /// Replace the drawn geometry with 32-bit indexed vertices
    pub fn upload_mesh_u32<V: Pod>(&mut self, vertices: &[V], indices: &[u32]) -> VulkanResult<()> {
        let vertex_buffer = GpuBuffer::vertices(&self.allocator, vertices)?;
        let index_buffer = GpuBuffer::indices_u32(&self.allocator, indices)?;
        self.replace_mesh(vertex_buffer, index_buffer)
    }

    fn replace_mesh(
        &mut self,
        vertices: GpuBuffer<VmaAllocator>,
        indices: GpuBuffer<VmaAllocator>,
    ) -> VulkanResult<()> {
        // Submitted frames may still read the old buffers
        if self.targets.mesh.is_some() {
            self.context.wait_idle()?;
        }
        self.targets.mesh = Some(Mesh { vertices, indices });
        Ok(())
    }

    /// Render and present one frame.
    ///
    /// Swapchain staleness is handled internally; only fatal errors are
    /// returned.
    pub fn draw_frame(&mut self) -> VulkanResult<FrameOutcome> {
        let mut backend = VulkanFrameBackend {
            context: &self.context,
            targets: &mut self.targets,
        };
        self.scheduler.draw_frame(&mut backend)
    }

    /// Record a new drawable size; the swapchain is rebuilt before the next frame
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        log::debug!("Drawable resized to {}x{}", width, height);
        self.targets.drawable_size = (width, height);
        self.scheduler.request_recreation();
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.targets.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Frame counters so far
    pub fn stats(&self) -> FrameStats {
        self.scheduler.stats()
    }

    /// Graphics context the renderer runs on
    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::debug!("Cleaning up Renderer...");

        if let Err(e) = self.context.wait_idle() {
            log::error!("Failed to idle device before teardown: {}", e);
        }

        let stats = self.scheduler.stats();
        log::info!(
            "Renderer shutting down: {} frames presented, {} swapchain recreations, {} skipped",
            stats.frames_presented,
            stats.recreations,
            stats.frames_skipped
        );
    }
}

/// Vulkan implementation of the frame protocol steps
struct VulkanFrameBackend<'a> {
    context: &'a GraphicsContext,
    targets: &'a mut RenderTargets,
}

impl FrameBackend for VulkanFrameBackend<'_> {
    type Slot = FrameSync;

    fn wait_for_fence(&mut self, slot: &FrameSync) -> VulkanResult<()> {
        slot.in_flight().wait(u64::MAX)
    }

    fn reset_fence(&mut self, slot: &FrameSync) -> VulkanResult<()> {
        slot.in_flight().reset()
    }

    fn acquire_next_image(&mut self, slot: &FrameSync) -> VulkanResult<AcquiredImage> {
        self.targets.swapchain.acquire_next(slot.image_available().handle())
    }

    fn record(&mut self, slot: &FrameSync, image_index: u32) -> VulkanResult<()> {
        let targets = &*self.targets;
        let extent = targets.swapchain.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: targets.clear_color,
            },
        }];

        let mut recorder = CommandRecorder::new(slot.command_buffer(), self.context.device().clone());
        recorder.reset_and_begin()?;
        {
            let mut pass = recorder.begin_render_pass(
                targets.swapchain.render_pass().handle(),
                targets.swapchain.framebuffer(image_index)?,
                render_area,
                &clear_values,
            )?;

            let viewport = vk::Viewport::builder()
                .x(0.0)
                .y(0.0)
                .width(extent.width as f32)
                .height(extent.height as f32)
                .min_depth(0.0)
                .max_depth(1.0)
                .build();
            pass.set_viewport(&viewport);
            pass.set_scissor(&render_area);

            if let Some(mesh) = &targets.mesh {
                pass.bind_graphics_pipeline(targets.pipeline.handle());
                pass.bind_vertex_buffer(mesh.vertices.handle());
                if let BufferRole::Index(index_type) = mesh.indices.role() {
                    pass.bind_index_buffer(mesh.indices.handle(), index_type.to_vk());
                }
                pass.draw_indexed(mesh.indices.index_count().unwrap_or(0));
            }
        }
        recorder.end()?;
        Ok(())
    }

    fn submit(&mut self, slot: &FrameSync) -> VulkanResult<()> {
        let wait_semaphores = [slot.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [slot.command_buffer()];
        let signal_semaphores = [slot.render_finished().handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    slot.in_flight().handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: &FrameSync, image_index: u32) -> VulkanResult<()> {
        debug_assert_eq!(self.targets.swapchain.current_image(), Some(image_index));
        self.targets
            .swapchain
            .present(self.context.present_queue(), slot.render_finished().handle())
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<bool> {
        let (width, height) = self.targets.drawable_size;
        if width == 0 || height == 0 {
            return Ok(false);
        }

        // The surface can report no area before the resize event arrives
        let recreated = self.targets.swapchain.recreate(self.context, width, height);
        let Some(format_changed) = defer_zero_area(recreated)? else {
            log::debug!("Surface has no area yet; keeping the current swapchain");
            return Ok(false);
        };

        if format_changed {
            self.targets.pipeline = GraphicsPipeline::compile(
                self.context,
                self.targets.swapchain.render_pass(),
                &self.targets.shaders,
                &self.targets.vertex_layout,
            )?;
        }
        Ok(true)
    }
}

/// Turn a zero-area surface into `Ok(None)`; every other error passes through
pub(crate) fn defer_zero_area<T>(result: VulkanResult<T>) -> VulkanResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(VulkanError::SurfaceZeroArea) => Ok(None),
        Err(e) => Err(e),
    }
}
