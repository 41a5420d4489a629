pub mod gc;
pub mod migrate;
pub mod sessions;
pub mod status;

use anyhow::{Context, Result};
use chatbox_infrastructure::StoreConfig;
use std::path::{Path, PathBuf};

/// Loads the configuration file and applies command-line overrides.
pub fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StoreConfig::load_default().context("Failed to load default config")?,
    };

    if let Some(data_dir) = data_dir {
        config.storage.data_dir = Some(data_dir);
    }
    Ok(config)
}
