//! In-memory `BlobStorage` implementation.
//!
//! Resolves keys to inline `data:` URLs, which is what a renderer without
//! filesystem access needs.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatbox_core::error::Result;
use chatbox_core::storage::{BlobStorage, DisplaySource};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blobs<I, K>(blobs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self {
            blobs: RwLock::new(blobs.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

/// Builds a `data:` URL, guessing the MIME type from the key's extension.
pub(crate) fn data_url(key: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(key).first_or_octet_stream();
    format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes))
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn resolve(&self, key: &str) -> Result<Option<DisplaySource>> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .get(key)
            .map(|bytes| DisplaySource::DataUrl(data_url(key, bytes))))
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let blobs = MemoryBlobStorage::new();
        blobs.put("avatar-1.png", vec![1, 2, 3]).await.unwrap();

        assert!(blobs.contains("avatar-1.png").await.unwrap());
        assert_eq!(blobs.get("avatar-1.png").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(blobs.list_keys().await.unwrap(), vec!["avatar-1.png".to_string()]);

        blobs.delete("avatar-1.png").await.unwrap();
        blobs.delete("avatar-1.png").await.unwrap();
        assert!(!blobs.contains("avatar-1.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_to_data_url() {
        let blobs = MemoryBlobStorage::with_blobs([("a.png", b"hi".to_vec())]);

        let source = blobs.resolve("a.png").await.unwrap();
        assert_eq!(
            source,
            Some(DisplaySource::DataUrl("data:image/png;base64,aGk=".to_string()))
        );
        assert_eq!(blobs.resolve("missing").await.unwrap(), None);
    }

    #[test]
    fn test_data_url_without_extension_is_octet_stream() {
        assert!(data_url("avatar-123", b"x").starts_with("data:application/octet-stream;base64,"));
    }
}
