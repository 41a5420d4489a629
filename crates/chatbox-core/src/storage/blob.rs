//! Blob storage trait.
//!
//! Large assets (assistant avatars) are stored here and referenced from
//! session records by key. Session records never own blob bytes.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Something a view component can render an image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    /// A file on local disk.
    File(PathBuf),
    /// An inline `data:` URL.
    DataUrl(String),
}

/// Key-addressed byte storage for large assets.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deletes a blob. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists every stored key, sorted.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Resolves a key to a render-capable source, or `None` if absent.
    async fn resolve(&self, key: &str) -> Result<Option<DisplaySource>>;

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
