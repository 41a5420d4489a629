//! Unified path management for Chatbox storage.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.local/share/chatbox/      # Data directory (platform default via `dirs`)
//! ├── store/                   # Session repository (one file per key)
//! │   └── .lock                # Single-instance lock
//! └── blobs/                   # Blob storage (avatars)
//!
//! ~/.config/chatbox/
//! └── config.toml              # Store configuration
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "chatbox";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for chatbox_core::StoreError {
    fn from(err: PathError) -> Self {
        chatbox_core::StoreError::config(err.to_string())
    }
}

/// Resolves storage locations, optionally rooted at an override directory.
///
/// With an override (tests, `--data-dir`), every data path lives under it.
#[derive(Debug, Clone, Default)]
pub struct ChatboxPaths {
    data_override: Option<PathBuf>,
}

impl ChatboxPaths {
    pub fn new(data_override: Option<PathBuf>) -> Self {
        Self { data_override }
    }

    /// Returns the data directory (e.g. `~/.local/share/chatbox/`).
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.data_override {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the session repository directory.
    pub fn store_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("store"))
    }

    /// Returns the blob storage directory.
    pub fn blobs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("blobs"))
    }

    /// Returns the default configuration file (`~/.config/chatbox/config.toml`).
    pub fn config_file() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join("config.toml"))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn data_override(&self) -> Option<&Path> {
        self.data_override.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_roots_every_data_path() {
        let paths = ChatboxPaths::new(Some(PathBuf::from("/tmp/chatbox-test")));
        assert_eq!(paths.data_dir().unwrap(), PathBuf::from("/tmp/chatbox-test"));
        assert_eq!(
            paths.store_dir().unwrap(),
            PathBuf::from("/tmp/chatbox-test/store")
        );
        assert_eq!(
            paths.blobs_dir().unwrap(),
            PathBuf::from("/tmp/chatbox-test/blobs")
        );
    }

    #[test]
    fn test_default_data_dir_ends_with_app_dir() {
        // Skipped silently on hosts without a resolvable home directory.
        if let Ok(dir) = ChatboxPaths::default().data_dir() {
            assert!(dir.ends_with("chatbox"));
        }
    }

    #[test]
    fn test_config_file() {
        if let Ok(file) = ChatboxPaths::config_file() {
            assert!(file.ends_with("chatbox/config.toml"));
        }
    }
}
