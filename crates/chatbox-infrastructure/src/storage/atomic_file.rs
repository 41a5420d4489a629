//! Atomic file operations for the file-backed stores.
//!
//! Provides:
//! - **Atomicity**: writes are all-or-nothing via tmp file + atomic rename
//! - **Durability**: explicit fsync before rename
//! - **Isolation**: an exclusive directory lock held for the store's lifetime

use chatbox_core::error::{Result, StoreError};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Reads a file, returning `None` if it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `bytes` to `path` atomically.
///
/// The data is written to a hidden temporary file in the same directory,
/// synced, and renamed over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage(path, bytes)?;
    promote(&staged, path)
}

/// Writes `bytes` to the temporary sibling of `path` and syncs it, leaving
/// `path` itself untouched.
pub(crate) fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(bytes)?;

    // Ensure data is written to disk
    tmp_file.sync_all()?;
    Ok(tmp_path)
}

/// Renames a file produced by [`stage`] over its target.
pub(crate) fn promote(staged: &Path, path: &Path) -> Result<()> {
    fs::rename(staged, path)?;
    Ok(())
}

/// Makes renames and removals inside `dir` durable.
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// True for names produced by [`temp_path`].
pub(crate) fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

/// Removes a file; a missing file is not an error.
pub(crate) fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::storage(format!("Path {:?} has no parent directory", path)))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::storage(format!("Path {:?} has no file name", path)))?;

    let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
    Ok(parent.join(tmp_name))
}

/// An exclusive lock on a store directory, released when dropped.
///
/// A second process opening the same directory fails fast instead of
/// blocking, since only one client instance may write the store. The lock
/// file stays on disk; closing the handle releases the lock.
#[derive(Debug)]
pub(crate) struct DirLock {
    _file: File,
}

impl DirLock {
    pub(crate) const FILE_NAME: &'static str = ".lock";

    pub(crate) fn acquire(dir: &Path) -> Result<Self> {
        use fs2::FileExt;

        fs::create_dir_all(dir)?;
        let lock_path = dir.join(Self::FILE_NAME);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.try_lock_exclusive().map_err(|e| {
            StoreError::storage(format!(
                "Store at {:?} is locked by another instance: {}",
                dir, e
            ))
        })?;

        Ok(DirLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("value");

        write_atomic(&path, b"hello").unwrap();
        assert_eq!(read_optional(&path).unwrap(), Some(b"hello".to_vec()));

        // Verify no temp file left behind
        assert!(!temp_dir.path().join(".value.tmp").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(read_optional(&temp_dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        remove_optional(&temp_dir.path().join("missing")).unwrap();
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/value");
        write_atomic(&path, b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_staged_write_is_invisible_until_promoted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("value");
        write_atomic(&path, b"old").unwrap();

        let staged = stage(&path, b"new").unwrap();
        assert!(is_temp_name(&staged.file_name().unwrap().to_string_lossy()));
        assert_eq!(read_optional(&path).unwrap(), Some(b"old".to_vec()));

        promote(&staged, &path).unwrap();
        assert_eq!(read_optional(&path).unwrap(), Some(b"new".to_vec()));
        assert!(!staged.exists());
    }

    #[test]
    fn test_second_lock_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let _first = DirLock::acquire(temp_dir.path()).unwrap();
        let second = DirLock::acquire(temp_dir.path());
        assert!(second.unwrap_err().is_storage_unavailable());
    }

    #[test]
    fn test_lock_file_is_kept_and_reusable_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let first = DirLock::acquire(temp_dir.path()).unwrap();
        drop(first);

        assert!(temp_dir.path().join(DirLock::FILE_NAME).exists());
        let _second = DirLock::acquire(temp_dir.path()).unwrap();
    }
}
