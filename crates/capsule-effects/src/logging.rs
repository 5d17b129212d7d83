//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level when set. Initialization is
//! idempotent so tests and embedding applications can call it freely.

use capsule_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber; returns false if one was already installed
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .is_ok()
}
