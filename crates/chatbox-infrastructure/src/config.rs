//! Store configuration.
//!
//! Loads `StoreConfig` from a TOML file. A missing file yields defaults; a
//! malformed one is reported as `StoreError::Config`.
//!
//! ```toml
//! log_level = "info"
//!
//! [storage]
//! backend = "file"
//! data_dir = "/path/override"
//! ```

use crate::paths::ChatboxPaths;
use chatbox_core::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which medium backs the repository and blob storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One file per key under the data directory.
    #[default]
    File,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Overrides the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Root configuration for the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::config(format!("Invalid config: {}", e)))
    }

    /// Loads configuration from `path`, falling back to defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads from the platform default location.
    pub fn load_default() -> Result<Self> {
        Self::load(&ChatboxPaths::config_file()?)
    }

    /// Returns the path resolver for this configuration.
    pub fn paths(&self) -> ChatboxPaths {
        ChatboxPaths::new(self.storage.data_dir.clone())
    }
}
