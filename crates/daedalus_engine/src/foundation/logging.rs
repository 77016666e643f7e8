//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system using `RUST_LOG` only
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a fallback level.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. `"info"`, `"debug"`)
/// becomes the default filter. Calling this twice is harmless.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
