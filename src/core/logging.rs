//! Explicit tracing setup
//!
//! The library only emits `tracing` events. Installing a subscriber is the
//! binary's job and happens once through [`init`].

use crate::core::config::LoggingConfig;
use crate::core::error::{Result, SimError};
use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber. `RUST_LOG` wins over the configured filter.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| SimError::Config(format!("bad log filter '{}': {}", config.filter, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| SimError::Config(format!("logging already initialised: {}", e)))
}
