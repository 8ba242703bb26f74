//! YAML configuration for a registry.
//!
//! One file describes the cache bound, the table layout and the store
//! backend. Every section is optional and falls back to the defaults below.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "objects"
//!
//! cache:
//!   capacity: 1000
//!
//! table:
//!   name: json_objects
//!   id_column: id
//!   json_column: json_object
//!
//! store:
//!   backend: sqlite        # in_memory | redb | sqlite
//!   path: /var/lib/json-register/objects.sqlite3
//!   pool_size: 10
//!   acquire_timeout_ms: 5000
//!   busy_timeout_ms: 5000
//! ```

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use store::{BackendConfig, SqliteConfig, StoreError, TableConfig};
use thiserror::Error;

/// Default number of cached key → identifier entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration for a registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterConfig {
    /// Configuration format version
    #[serde(default = "default_config_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub cache: CacheYamlConfig,

    #[serde(default)]
    pub table: TableConfig,

    #[serde(default)]
    pub store: StoreYamlConfig,
}

impl RegisterConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: RegisterConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// In-memory store with default cache and table settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.cache.validate()?;
        validate_table(&self.table)?;
        self.store.validate()?;
        Ok(())
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize, ConfigLoadError> {
        NonZeroUsize::new(self.cache.capacity).ok_or_else(|| {
            ConfigLoadError::Validation("cache.capacity must be >= 1".to_string())
        })
    }

    /// The store backend this configuration selects.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigLoadError> {
        self.store.backend_config()
    }
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            cache: CacheYamlConfig::default(),
            table: TableConfig::default(),
            store: StoreYamlConfig::default(),
        }
    }
}

fn validate_table(table: &TableConfig) -> Result<(), ConfigLoadError> {
    table.validate().map_err(|err| match err {
        StoreError::InvalidConfig(message) => {
            ConfigLoadError::Validation(format!("table: {message}"))
        }
        other => ConfigLoadError::Validation(format!("table: {other}")),
    })
}

/// Lookup cache YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheYamlConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl CacheYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.capacity == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Store backend YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    /// `in_memory`, `redb` or `sqlite`
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database file, required by `redb` and `sqlite`
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_timeout_ms")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.backend.as_str() {
            "in_memory" => {}
            "redb" | "sqlite" => {
                if self.path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                    return Err(ConfigLoadError::MissingField(format!(
                        "store.path (required by the {} backend)",
                        self.backend
                    )));
                }
            }
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "store.backend must be one of: in_memory, redb, sqlite (got {other:?})"
                )));
            }
        }
        if self.pool_size == 0 {
            return Err(ConfigLoadError::Validation(
                "store.pool_size must be >= 1".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 || self.busy_timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "store timeouts must be >= 1ms".to_string(),
            ));
        }
        Ok(())
    }

    fn backend_config(&self) -> Result<BackendConfig, ConfigLoadError> {
        self.validate()?;
        let path = || {
            self.path
                .clone()
                .ok_or_else(|| ConfigLoadError::MissingField("store.path".to_string()))
        };
        match self.backend.as_str() {
            "redb" => Ok(BackendConfig::redb(path()?)),
            "sqlite" => Ok(BackendConfig::sqlite(
                SqliteConfig::new(path()?)
                    .with_pool_size(self.pool_size)
                    .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
                    .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms)),
            )),
            _ => Ok(BackendConfig::in_memory()),
        }
    }
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            pool_size: default_pool_size(),
            acquire_timeout_ms: default_timeout_ms(),
            busy_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_config_version() -> String {
    "1.0".to_string()
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_backend() -> String {
    "in_memory".to_string()
}
fn default_pool_size() -> usize {
    10
}
fn default_timeout_ms() -> u64 {
    5000
}
