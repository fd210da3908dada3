//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use study_material_core::PortError;

/// The primary error type for the `study_material_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failures_keep_their_source_message() {
        let config: ApiError = ConfigError::MissingVar("DATA_DIR".to_string()).into();
        assert_eq!(
            config.to_string(),
            "Configuration error: Missing the environment variable DATA_DIR"
        );

        let port: ApiError = PortError::Unexpected("read-only file system".to_string()).into();
        assert_eq!(
            port.to_string(),
            "Service Port Error: An unexpected error occurred: read-only file system"
        );
    }
}
