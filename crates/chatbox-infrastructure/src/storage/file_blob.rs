//! File-backed `BlobStorage` implementation.
//!
//! One file per blob under the blobs directory, named with the same key
//! encoding the repository uses. Keys resolve to the file path so the
//! renderer can load the image straight from disk.

use super::atomic_file;
use super::key_encoding::{decode_key, encode_key};
use async_trait::async_trait;
use chatbox_core::error::Result;
use chatbox_core::storage::{BlobStorage, DisplaySource};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    /// Opens (creating if needed) a blob directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        atomic_file::write_atomic(&self.path_for(key), &bytes)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        atomic_file::read_optional(&self.path_for(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        atomic_file::remove_optional(&self.path_for(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(decode_key) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn resolve(&self, key: &str) -> Result<Option<DisplaySource>> {
        let path = self.path_for(key);
        if path.is_file() {
            Ok(Some(DisplaySource::File(path)))
        } else {
            Ok(None)
        }
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).is_file())
    }
}
