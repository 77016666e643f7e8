//! Asset loading
//!
//! The renderer reads exactly one kind of asset: precompiled SPIR-V shader
//! bytecode. Loading goes through the [`FileLoader`] trait so tests and tools
//! can substitute in-memory sources.

pub mod file_loader;

pub use file_loader::{FileLoader, FsFileLoader, MemoryFileLoader};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// The requested file does not exist or cannot be opened
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path that was requested
        path: String,
    },

    /// The file exists but reading it failed
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path that was being read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}
