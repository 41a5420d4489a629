//! Session repository trait and the transaction staging area.
//!
//! Defines the key-value contract the rest of the store persists through.
//! The concrete medium (files, an in-memory map, a browser store) lives in
//! the infrastructure layer.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Synchronous read access used by a [`Transaction`] to see committed data.
pub trait KeyValueRead: Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns committed keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read-modify-write closure passed to [`Repository::transact`].
pub type TransactFn<'f> = Box<dyn for<'t> FnOnce(&mut Transaction<'t>) -> Result<()> + Send + 'f>;

/// Staged writes over a consistent view of the repository.
///
/// Reads see staged writes first. Nothing reaches the medium unless the
/// closure that owns the transaction returns `Ok`.
pub struct Transaction<'a> {
    base: &'a dyn KeyValueRead,
    staged: BTreeMap<String, Option<Vec<u8>>>,
}

impl<'a> Transaction<'a> {
    pub fn new(base: &'a dyn KeyValueRead) -> Self {
        Self {
            base,
            staged: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.base.read(key),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.staged.insert(key.into(), Some(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.staged.insert(key.into(), None);
    }

    /// Lists keys with `prefix`, merging staged sets and deletes into the
    /// committed key set.
    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: std::collections::BTreeSet<String> =
            self.base.keys(prefix)?.into_iter().collect();
        for (key, value) in self.staged.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        Ok(keys.into_iter().collect())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt_json(key, e)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes);
        Ok(())
    }

    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Consumes the transaction, yielding staged changes (`None` = delete).
    pub fn into_changes(self) -> BTreeMap<String, Option<Vec<u8>>> {
        self.staged
    }
}

/// Durable key-value persistence of session records and settings.
///
/// # Implementation Notes
///
/// Implementations must:
/// - make a completed `set`/`delete` visible to the next `get` (no write-behind)
/// - serialize `transact` callers within the process
/// - write nothing when the transaction closure fails
/// - map medium failures to `StoreError::StorageUnavailable`
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deletes a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Runs a read-modify-write under mutual exclusion with every other
    /// in-process `transact` caller.
    async fn transact(&self, f: TransactFn<'_>) -> Result<()>;
}

/// JSON convenience methods for any [`Repository`].
#[async_trait]
pub trait RepositoryExt: Repository {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt_json(key, e)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes).await
    }

    /// Boxes `f` and runs it through [`Repository::transact`].
    async fn transaction<F>(&self, f: F) -> Result<()>
    where
        F: for<'t> FnOnce(&mut Transaction<'t>) -> Result<()> + Send,
    {
        self.transact(Box::new(f)).await
    }
}

impl<R: Repository + ?Sized> RepositoryExt for R {}
