//! Core crate for GeoFix: configuration, error types and logging setup.

pub mod config;
pub mod error;

pub use config::{Config, GeocoderPolicy, LocationConfig, UpdateDetail};
pub use error::{AcquireError, AppError, ConfigError};

use anyhow::Result;

/// Initialize logging for the application.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!("GeoFix core initialized");
    Ok(())
}
