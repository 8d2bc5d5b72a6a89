//! Logging setup for provider hosts
//!
//! Log lines go to stderr; stdout belongs to the host's plugin protocol.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, checked before `RUST_LOG`
pub const LOG_ENV: &str = "KEYWARD_LOG";

/// Filter from `KEYWARD_LOG`, then `RUST_LOG`, then `default_filter`
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn try_init_logging(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_ok()
}

/// Install the global subscriber, ignoring an existing one
pub fn init_logging(default_filter: &str) {
    if !try_init_logging(default_filter) {
        tracing::debug!("Logging already initialized");
    }
}
