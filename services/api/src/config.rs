//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use study_material_core::{RecoveryConfig, ValidationLimits};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `DocumentStore` adapter backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub storage_backend: StorageBackend,
    pub data_dir: PathBuf,
    pub history_limit: usize,
    pub max_materials: Option<usize>,
    pub limits: ValidationLimits,
    pub recovery: RecoveryConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage Settings ---
        let storage_backend = match lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "file".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "file" => StorageBackend::File,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of: memory, file", other),
                ))
            }
        };

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        if storage_backend == StorageBackend::File && data_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingVar("DATA_DIR".to_string()));
        }

        let history_limit = parse_or(&lookup, "HISTORY_LIMIT", 100)?;
        let max_materials = parse_optional(&lookup, "MAX_MATERIALS")?;

        // --- Engine Settings ---
        let defaults = ValidationLimits::default();
        let limits = ValidationLimits {
            max_sections: parse_or(&lookup, "MAX_SECTIONS", defaults.max_sections)?,
            max_images: parse_or(&lookup, "MAX_IMAGES", defaults.max_images)?,
            max_content_length: parse_or(&lookup, "MAX_CONTENT_LENGTH", defaults.max_content_length)?,
        };

        let recovery_defaults = RecoveryConfig::default();
        let recovery = RecoveryConfig {
            max_attempts: parse_or(&lookup, "RECOVERY_MAX_ATTEMPTS", recovery_defaults.max_attempts)?,
            backoff: parse_optional::<u64, _>(&lookup, "RECOVERY_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(recovery_defaults.backoff),
        };

        Ok(Self {
            bind_address,
            log_level,
            storage_backend,
            data_dir,
            history_limit,
            max_materials,
            limits,
            recovery,
        })
    }
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
        })
        .transpose()
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.storage_backend, StorageBackend::File);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.limits, ValidationLimits::default());
        assert_eq!(config.recovery.max_attempts, 3);
        assert!(config.max_materials.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("MAX_SECTIONS", "10"),
            ("RECOVERY_BACKOFF_MS", "0"),
            ("MAX_MATERIALS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.limits.max_sections, 10);
        assert!(config.recovery.backoff.is_zero());
        assert_eq!(config.max_materials, Some(5));
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "postgres")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "STORAGE_BACKEND"));

        let err = Config::from_lookup(lookup_from(&[("MAX_SECTIONS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "MAX_SECTIONS"));
    }
}
