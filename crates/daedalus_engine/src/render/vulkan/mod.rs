//! Vulkan rendering backend
//!
//! Thin RAII wrappers over ash. Every wrapper owns a clone of the logical
//! device and destroys its handle on drop, so teardown order is decided by
//! field order in the owning struct.

pub mod allocator;
pub mod buffer;
pub mod commands;
pub mod context;
pub mod error;
pub mod framebuffer;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod swapchain_manager;
pub mod sync;
pub mod vertex_layout;

pub use allocator::{MemoryAllocator, VmaAllocator};
pub use buffer::{BufferRole, GpuBuffer, IndexType};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{
    select_adapter, AdapterCandidate, AdapterInfo, GraphicsContext, QueueFamilyIndices,
    QueueFamilySupport, VulkanInstance,
};
pub use error::{VulkanError, VulkanResult};
pub use framebuffer::Framebuffer;
pub use render_pass::RenderPass;
pub use shader::{parse_spirv, GraphicsPipeline, ShaderPair};
pub use swapchain::{Swapchain, SwapchainPlan};
pub use swapchain_manager::SwapchainManager;
pub use sync::{Fence, FrameSync, Semaphore};
pub use vertex_layout::{AttributeType, VertexAttribute, VertexLayout};
