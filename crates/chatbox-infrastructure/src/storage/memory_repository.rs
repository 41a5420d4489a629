//! In-memory `Repository` implementation.
//!
//! Used by tests, by the `memory` backend, and as the reference behavior for
//! the file-backed repository. A transaction commit is applied under a single
//! write lock, so it is atomic with respect to every reader.

use async_trait::async_trait;
use chatbox_core::error::{Result, StoreError};
use chatbox_core::storage::{KeyValueRead, Repository, TransactFn, Transaction};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    /// Serializes writers (`set`, `delete`, `transact`).
    write_lock: Mutex<()>,
    read_only: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with raw entries.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            entries: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Creates a repository from JSON values, one per key.
    pub fn with_json_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self::with_entries(entries.into_iter().map(|(k, v)| (k, v.to_string().into_bytes())))
    }

    /// Makes every subsequent write fail with `StorageUnavailable`,
    /// simulating an exhausted quota or revoked permission.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Returns a copy of every committed entry.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::storage(
                "Repository is read-only (quota exceeded or permission denied)",
            ));
        }
        Ok(())
    }
}

impl KeyValueRead for MemoryRepository {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_writable()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_writable()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.keys(prefix)
    }

    async fn transact(&self, f: TransactFn<'_>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let changes = {
            let mut tx = Transaction::new(self);
            f(&mut tx)?;
            tx.into_changes()
        };

        if changes.is_empty() {
            return Ok(());
        }
        self.ensure_writable()?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, change) in changes {
            match change {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
