//! Centralized error types for GeoFix.
//!
//! The orchestrator never lets an error escape its boundary: every terminal
//! condition becomes a recorded location status plus an idle signal. The
//! types here exist so that those conditions are precise and so that the
//! surrounding application can render a user-facing message.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Acquire(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Terminal conditions of a location acquisition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("no network connectivity")]
    NoConnectivity,

    #[error("location request timed out")]
    Timeout,

    #[error("no location found")]
    NoLocationFound,

    #[error("retry attempts exhausted")]
    RetriesExhausted,
}

impl AcquireError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AcquireError::PermissionDenied => {
                "Location permission is missing. Check app permissions."
            }
            AcquireError::NoConnectivity => "No network connection. Location update postponed.",
            AcquireError::Timeout => "Locating took too long. Please try again.",
            AcquireError::NoLocationFound => "Your position could not be determined.",
            AcquireError::RetriesExhausted => {
                "Still no network connection. Location marked unreachable."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err = AcquireError::PermissionDenied;
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Acquire(AcquireError::PermissionDenied)));
    }

    #[test]
    fn test_user_message_propagation() {
        let app = AppError::Acquire(AcquireError::NoConnectivity);
        assert_eq!(
            app.user_message(),
            "No network connection. Location update postponed."
        );
    }

    #[test]
    fn test_acquire_errors_display() {
        assert_eq!(AcquireError::Timeout.to_string(), "location request timed out");
        assert_eq!(AcquireError::NoLocationFound.to_string(), "no location found");
    }
}
