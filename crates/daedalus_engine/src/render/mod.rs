//! # Rendering System
//!
//! Frame lifecycle for a single window:
//!
//! - **Window**: the narrow [`WindowSystem`] view of the platform window
//! - **Vulkan backend**: RAII wrappers for the context, swapchain, pipeline,
//!   buffers and synchronization objects
//! - **Frame scheduler**: bounded frames-in-flight protocol, independent of
//!   Vulkan so it can be exercised without a GPU
//! - **Renderer**: the facade applications drive once per frame
//!
//! Construction order is context, swapchain, pipeline, frame slots.
//! Destruction runs in reverse after the device is idle.

pub mod frame;
pub mod renderer;
pub mod vulkan;
pub mod window;

pub use frame::{AcquiredImage, FrameBackend, FrameOutcome, FrameScheduler, FrameStats, SlotState};
pub use renderer::Renderer;
pub use window::{Window, WindowError, WindowEvent, WindowResult, WindowSystem};

#[cfg(test)]
mod tests;
