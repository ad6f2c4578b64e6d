//! Logging initialization for processes embedding the cache.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the owning process, typically by calling [`init`] once at startup.
//! The RUST_LOG environment variable takes precedence over the configured
//! level.
//!
//! # Example
//!
//! ```ignore
//! use labelcache::{Config, logging};
//!
//! let config = Config::load("/etc/labelcache.toml")?;
//! logging::init(&config.logging)?;
//!
//! tracing::info!("label cache starting");
//! ```

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber for `config`.
///
/// Returns an error if a global subscriber is already installed, so tests
/// and embedding processes can call this more than once safely.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(&config.level),
    };
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    }
}
