//! Diagnostics facade.
//!
//! The runtime instruments itself with `tracing`; this module installs a
//! colorized console subscriber with thread names, serialized by the
//! subscriber's own writer lock. Diagnostics are never used for control
//! flow. Filtering follows `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Install the console subscriber. Safe to call more than once; later calls
/// are ignored if a subscriber is already set.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_ansi(true)
        .with_target(false)
        .try_init();
}
