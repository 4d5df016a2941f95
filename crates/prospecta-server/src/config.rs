//! Configuration management for the Prospecta server.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use prospecta_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use prospecta_domain::LoaderConfig;
use prospecta_storage::PostgresConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Environment variable prefix, e.g. `PROSPECTA_LOADER__MAX_BATCH_SIZE`.
const ENV_PREFIX: &str = "PROSPECTA";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Batching loader settings
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type: "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database connection URL (required if backend is "postgres")
    pub database_url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-query timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: None,
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_query_timeout() -> u64 {
    30
}

/// Batching loader settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// loader:
///   max_batch_size: 100
///   wait_millis: 1
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoaderSettings {
    /// Distinct keys per store call before a batch is flushed early.
    ///
    /// Environment variable: `PROSPECTA_LOADER__MAX_BATCH_SIZE`
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Window delay before a partial batch is flushed.
    ///
    /// Environment variable: `PROSPECTA_LOADER__WAIT_MILLIS`
    #[serde(default = "default_wait_millis")]
    pub wait_millis: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            wait_millis: default_wait_millis(),
        }
    }
}

fn default_max_batch_size() -> usize {
    100
}

fn default_wait_millis() -> u64 {
    1
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingSettings {
    /// The configured level, used when `RUST_LOG` is not set.
    pub fn level(&self) -> Result<Level, ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.level.to_lowercase();
        if !valid_levels.contains(&level.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.level
                ),
            });
        }
        level.parse().map_err(|_| ConfigLoadError::Invalid {
            message: format!("logging.level is not a valid level: {}", self.level),
        })
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `PROSPECTA_` and use `__` as
    /// separator. For example:
    /// - `PROSPECTA_LOADER__MAX_BATCH_SIZE=50` overrides `loader.max_batch_size`
    /// - `PROSPECTA_STORAGE__DATABASE_URL=...` overrides `storage.database_url`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via `PROSPECTA_` prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["memory", "postgres"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        if self.storage.backend == "postgres"
            && self
                .storage
                .database_url
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid {
                message: "storage.database_url is required when backend is 'postgres'"
                    .to_string(),
            });
        }

        if self.loader.max_batch_size == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "loader.max_batch_size must be greater than 0".to_string(),
            });
        }

        self.logging.level()?;

        Ok(())
    }

    /// Loader settings as a domain [`LoaderConfig`].
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_max_batch_size(self.loader.max_batch_size)
            .with_wait(Duration::from_millis(self.loader.wait_millis))
    }

    /// PostgreSQL connection settings, when the postgres backend is selected.
    pub fn postgres_config(&self) -> Option<PostgresConfig> {
        if self.storage.backend != "postgres" {
            return None;
        }
        let database_url = self.storage.database_url.clone()?;
        Some(PostgresConfig {
            database_url,
            max_connections: self.storage.pool_size,
            connect_timeout_secs: self.storage.connection_timeout_secs,
            query_timeout_secs: self.storage.query_timeout_secs,
            ..Default::default()
        })
    }
}

/// Use __ as separator for nested keys: PROSPECTA_STORAGE__BACKEND -> storage.backend
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}
