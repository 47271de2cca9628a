//! Configuration module for Cirrus.

use serde::Deserialize;
use std::path::Path;

use crate::{CirrusError, Result};

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the storage root directory.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum storage per owner in bytes.
    #[serde(default = "default_max_owner_storage")]
    pub max_owner_storage: i64,
}

fn default_storage_path() -> String {
    "data/storage".to_string()
}

fn default_max_owner_storage() -> i64 {
    // 10 GiB
    10 * 1024 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_owner_storage: default_max_owner_storage(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/cirrus.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "data/logs/cirrus.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration for Cirrus.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CirrusError::Config(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_owner_storage <= 0 {
            return Err(CirrusError::Config(
                "storage.max_owner_storage must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
