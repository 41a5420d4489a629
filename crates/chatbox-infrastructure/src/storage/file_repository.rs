//! File-backed `Repository` implementation.
//!
//! Directory structure:
//! ```text
//! store/
//! ├── .lock                     # held while the repository is open
//! ├── .journal                  # only while a transaction is committing
//! ├── schema-version
//! ├── settings
//! ├── session-order
//! └── session%3A<id>            # one file per session record
//! ```
//!
//! Every write is atomic per key (tmp file + fsync + rename). A transaction
//! commits in three phases:
//!
//! 1. every new value is staged as a hidden `.<key>.tmp` file;
//! 2. a `.journal` listing the staged keys and the deletes is written
//!    atomically, which is the commit point;
//! 3. staged files are renamed into place, deletes run, the journal goes.
//!
//! A failure before the journal exists discards the staged files and leaves
//! the store untouched. A crash after it is finished by the next `open`.

use super::atomic_file::{self, DirLock};
use super::key_encoding::{decode_key, encode_key};
use async_trait::async_trait;
use chatbox_core::error::{Result, StoreError};
use chatbox_core::storage::{KeyValueRead, Repository, TransactFn, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const JOURNAL_FILE: &str = ".journal";

/// The committed but possibly unapplied part of a transaction.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    sets: Vec<String>,
    deletes: Vec<String>,
}

#[derive(Debug)]
pub struct FileRepository {
    root: PathBuf,
    /// Serializes writers (`set`, `delete`, `transact`).
    write_lock: Mutex<()>,
    _dir_lock: DirLock,
}

impl FileRepository {
    /// Opens (creating if needed) a repository rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the directory cannot be created, is
    /// already open in another process, or an interrupted commit cannot be
    /// finished.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir_lock = DirLock::acquire(&root)?;

        let repository = Self {
            root,
            write_lock: Mutex::new(()),
            _dir_lock: dir_lock,
        };
        repository.recover()?;
        tracing::debug!("Opened file repository at {:?}", repository.root);
        Ok(repository)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }

    fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    fn apply_changes(&self, changes: BTreeMap<String, Option<Vec<u8>>>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut journal = Journal::default();
        let mut staged = Vec::new();
        for (key, change) in changes {
            match change {
                Some(value) => match atomic_file::stage(&self.path_for(&key), &value) {
                    Ok(path) => {
                        staged.push(path);
                        journal.sets.push(key);
                    }
                    Err(e) => {
                        discard_staged(&staged);
                        return Err(e);
                    }
                },
                None => journal.deletes.push(key),
            }
        }

        let committed = serde_json::to_vec(&journal)
            .map_err(StoreError::from)
            .and_then(|bytes| atomic_file::write_atomic(&self.journal_path(), &bytes))
            .and_then(|()| atomic_file::sync_dir(&self.root));
        if let Err(e) = committed {
            discard_staged(&staged);
            atomic_file::remove_optional(&self.journal_path())?;
            return Err(e);
        }

        self.replay(&journal)?;
        atomic_file::remove_optional(&self.journal_path())
    }

    /// Moves staged values into place and runs the deletes. Safe to repeat.
    fn replay(&self, journal: &Journal) -> Result<()> {
        for key in &journal.sets {
            let path = self.path_for(key);
            let staged = atomic_file::temp_path(&path)?;
            if staged.exists() {
                atomic_file::promote(&staged, &path)?;
            }
        }
        for key in &journal.deletes {
            atomic_file::remove_optional(&self.path_for(key))?;
        }
        atomic_file::sync_dir(&self.root)
    }

    /// Finishes a commit interrupted after its journal was written, then
    /// drops staged files no journal refers to.
    fn recover(&self) -> Result<()> {
        if let Some(bytes) = atomic_file::read_optional(&self.journal_path())? {
            let journal: Journal = serde_json::from_slice(&bytes)?;
            tracing::warn!(
                "Finishing interrupted commit: {} sets, {} deletes",
                journal.sets.len(),
                journal.deletes.len()
            );
            self.replay(&journal)?;
            atomic_file::remove_optional(&self.journal_path())?;
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if entry.file_type()?.is_file() && atomic_file::is_temp_name(&name.to_string_lossy()) {
                tracing::debug!("Removing uncommitted file {:?}", name);
                atomic_file::remove_optional(&entry.path())?;
            }
        }
        Ok(())
    }
}

fn discard_staged(staged: &[PathBuf]) {
    for path in staged {
        if let Err(e) = atomic_file::remove_optional(path) {
            tracing::warn!("Failed to discard staged file {:?}: {}", path, e);
        }
    }
}

impl KeyValueRead for FileRepository {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        atomic_file::read_optional(&self.path_for(key))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(decode_key) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        atomic_file::write_atomic(&self.path_for(key), &value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        atomic_file::remove_optional(&self.path_for(key))
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

        self.apply_changes(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::storage::RepositoryExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let repo = FileRepository::open(temp_dir.path()).unwrap();
            repo.set_json("session:a", &serde_json::json!({"id": "a"}))
                .await
                .unwrap();
            repo.set_json("schema-version", &4u32).await.unwrap();
        }

        let repo = FileRepository::open(temp_dir.path()).unwrap();
        assert_eq!(repo.get_json::<u32>("schema-version").await.unwrap(), Some(4));
        assert_eq!(
            repo.list_keys("session:").await.unwrap(),
            vec!["session:a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_keys_ignores_lock_and_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::open(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(".session%3Ax.tmp"), b"partial").unwrap();
        repo.set("settings", b"{}".to_vec()).await.unwrap();

        assert_eq!(repo.list_keys("").await.unwrap(), vec!["settings".to_string()]);
    }

    #[tokio::test]
    async fn test_transact_applies_sets_and_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::open(temp_dir.path()).unwrap();
        repo.set("chat-sessions", b"[]".to_vec()).await.unwrap();

        repo.transaction(|tx| {
            tx.set("session-order", b"[]".to_vec());
            tx.delete("chat-sessions");
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(repo.get("chat-sessions").await.unwrap(), None);
        assert_eq!(repo.get("session-order").await.unwrap(), Some(b"[]".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_transaction_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::open(temp_dir.path()).unwrap();

        let result = repo
            .transaction(|tx| {
                tx.set("a", b"1".to_vec());
                Err(chatbox_core::StoreError::internal("abort"))
            })
            .await;

        assert!(result.is_err());
        assert!(repo.list_keys("").await.unwrap().is_empty());
    }

    #[test]
    fn test_second_open_is_storage_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let _first = FileRepository::open(temp_dir.path()).unwrap();
        let err = FileRepository::open(temp_dir.path()).unwrap_err();
        assert!(err.is_storage_unavailable());
    }

    fn stray_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != DirLock::FILE_NAME && name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commit_failing_midway_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::open(temp_dir.path()).unwrap();
        repo.set("chat-sessions", b"[]".to_vec()).await.unwrap();

        // Longer than any file name the OS accepts
        let too_long = format!("session:{}", "x".repeat(300));
        let result = repo
            .transaction(move |tx| {
                tx.set("schema-version", b"1".to_vec());
                tx.set("session-order", b"[]".to_vec());
                tx.set(&too_long, b"{}".to_vec());
                tx.delete("chat-sessions");
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_storage_unavailable());
        assert_eq!(repo.list_keys("").await.unwrap(), vec!["chat-sessions".to_string()]);
        assert!(stray_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_commit_is_finished_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let repo = FileRepository::open(temp_dir.path()).unwrap();
            repo.set("chat-sessions", b"[]".to_vec()).await.unwrap();

            // Crash after the journal and one rename
            let version = atomic_file::stage(&repo.path_for("schema-version"), b"1").unwrap();
            let session = atomic_file::stage(&repo.path_for("session:a"), b"{}").unwrap();
            let journal = Journal {
                sets: vec!["schema-version".to_string(), "session:a".to_string()],
                deletes: vec!["chat-sessions".to_string()],
            };
            atomic_file::write_atomic(&repo.journal_path(), &serde_json::to_vec(&journal).unwrap())
                .unwrap();
            atomic_file::promote(&session, &repo.path_for("session:a")).unwrap();
            assert!(version.exists());
        }

        let repo = FileRepository::open(temp_dir.path()).unwrap();
        assert_eq!(
            repo.list_keys("").await.unwrap(),
            vec!["schema-version".to_string(), "session:a".to_string()]
        );
        assert_eq!(repo.get("schema-version").await.unwrap(), Some(b"1".to_vec()));
        assert!(stray_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_staged_files_without_journal_are_dropped_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let repo = FileRepository::open(temp_dir.path()).unwrap();
            atomic_file::stage(&repo.path_for("schema-version"), b"9").unwrap();
        }

        let repo = FileRepository::open(temp_dir.path()).unwrap();
        assert_eq!(repo.get("schema-version").await.unwrap(), None);
        assert!(stray_files(temp_dir.path()).is_empty());
    }
}
