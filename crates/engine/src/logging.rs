//! Structured logging bring-up. A thin wrapper around
//! `tracing-subscriber`'s env-filter + fmt layers, configured from
//! [`crate::config::LogConfig`] instead of reading `RUST_LOG` directly, so
//! the same `roomstream.toml`/environment story in [`crate::config`]
//! governs verbosity.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs the global `tracing` subscriber. Idempotent-enough for tests:
/// `tracing_subscriber::fmt().try_init()` returns an error (ignored here) if
/// a subscriber is already installed, rather than panicking.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init();
}
