//! Foundation module - Core utilities used throughout the engine

pub mod logging;
