//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Log target used for messages emitted by scripts
pub const SCRIPT_TARGET: &str = "script";

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a fallback filter used when `RUST_LOG` is unset
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}
