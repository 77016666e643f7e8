//! # Core Engine Module
//!
//! Shared configuration used by every subsystem.

pub mod config;

pub use config::{
    ApplicationConfig,
    EngineConfig,
    RendererConfig,
    WindowConfig,
    ShaderConfig,
    PresentModePreference,
    Config,
    ConfigError,
};
