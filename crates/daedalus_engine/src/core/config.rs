//! # Unified Configuration System
//!
//! All configuration structures for the engine live here: window, renderer,
//! shaders and engine-wide settings. Everything is `serde`-serializable so an
//! application can keep its settings in a TOML or RON file through the
//! [`Config`] trait.

use serde::{Serialize, Deserialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Default number of frames the CPU may record ahead of the GPU
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound accepted for `frames_in_flight`
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// # Shader Configuration
///
/// Paths of the precompiled SPIR-V vertex and fragment shaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the common shader locations in order so the binary can be run
    /// from the workspace root or from its own directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "shaders/",
            "resources/shaders/",
            "data/",
            "./",
        ];

        let mut vertex_path = None;
        let mut fragment_path = None;

        for dir in &shader_dirs {
            let vertex_test = format!("{}{}", dir, base_vertex);
            let fragment_test = format!("{}{}", dir, base_fragment);

            if vertex_path.is_none() && Path::new(&vertex_test).exists() {
                vertex_path = Some(vertex_test);
            }
            if fragment_path.is_none() && Path::new(&fragment_test).exists() {
                fragment_path = Some(fragment_test);
            }

            if vertex_path.is_some() && fragment_path.is_some() {
                break;
            }
        }

        Self {
            vertex_shader_path: vertex_path.unwrap_or_else(|| format!("data/{}", base_vertex)),
            fragment_shader_path: fragment_path.unwrap_or_else(|| format!("data/{}", base_fragment)),
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("vertex.spv", "fragment.spv")
    }
}

/// Preferred presentation mode; unavailable modes fall back to FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// No vsync, tearing allowed
    Immediate,
    /// Triple-buffered, latest image wins
    Mailbox,
    /// Vsync; always supported
    Fifo,
}

impl Default for PresentModePreference {
    fn default() -> Self {
        Self::Immediate
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Daedalus".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// # Renderer Configuration
///
/// Vulkan backend settings: instance metadata, frames in flight, validation
/// and presentation preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Maximum frames the CPU may run ahead of the GPU
    pub frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (None = debug builds only)
    pub enable_validation: Option<bool>,
    /// Preferred presentation mode
    pub present_mode: PresentModePreference,
    /// RGBA clear colour of the swapchain render target
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        const GRAY: f32 = 16.0 / 255.0;
        Self {
            application_name: app_name.into(),
            shaders: ShaderConfig::default(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            enable_validation: None,
            present_mode: PresentModePreference::default(),
            clear_color: [GRAY, GRAY, GRAY, 1.0],
        }
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set maximum frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the preferred presentation mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("Frames in flight must be at least 1".to_string()));
        }

        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "Frames in flight should not exceed {}",
                MAX_FRAMES_IN_FLIGHT
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Daedalus")
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Window configuration
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        Self {
            engine: EngineConfig::default(),
            window: WindowConfig {
                title: app_name.clone(),
                ..WindowConfig::default()
            },
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("Window size must be non-zero".to_string()));
        }
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {}
