//! # Daedalus Engine
//!
//! A minimal Vulkan rendering engine built around a correct frame lifecycle:
//! device bring-up, swapchain negotiation, a fixed graphics pipeline and a
//! bounded number of frames in flight that survives window resizes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daedalus_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     daedalus_engine::foundation::logging::init();
//!
//!     let config = ApplicationConfig::load_or_default("daedalus.toml")?;
//!     let mut window = Window::new(&config.window)?;
//!     let layout = VertexLayout::packed(&[AttributeType::Float2, AttributeType::Float3])?;
//!     let mut renderer = Renderer::new(&mut window, &config.renderer, &FsFileLoader, layout)?;
//!
//!     while !window.should_close() {
//!         for event in window.poll_events() {
//!             if let WindowEvent::Resized { width, height } = event {
//!                 renderer.handle_resize(width, height);
//!             }
//!         }
//!         renderer.draw_frame()?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{FileLoader, FsFileLoader, MemoryFileLoader},
        config::Config,
        core::config::{ApplicationConfig, PresentModePreference, RendererConfig, ShaderConfig, WindowConfig},
        render::{
            vulkan::{AttributeType, VertexLayout, VulkanError, VulkanResult},
            FrameOutcome, Renderer, Window, WindowEvent, WindowSystem,
        },
    };
}
