//! Startup storage cleanup.
//!
//! Blob storage and the session records are only weakly linked: removing or
//! editing a session never deletes its avatar. Once per startup, after the
//! bridge is hydrated, this pass reconciles the two.

use crate::bridge::{ProjectionValue, ReactiveBridge};
use chatbox_core::error::Result;
use chatbox_core::storage::BlobStorage;
use std::collections::{BTreeSet, HashSet};

/// A session whose avatar key points at a blob that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanReference {
    pub session_id: String,
    pub key: String,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Blob keys deleted because no session referenced them.
    pub deleted: Vec<String>,
    /// Unreferenced blob keys that could not be deleted; retried next startup.
    pub failed: Vec<String>,
    /// Dangling references found and cleared.
    pub orphans: Vec<OrphanReference>,
    /// Blobs still referenced after the pass.
    pub retained: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty() && self.orphans.is_empty()
    }
}

/// Deletes blobs no live session references.
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageCleaner;

impl StorageCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Runs one cleanup pass.
    ///
    /// Afterwards every remaining blob is referenced by some session, and
    /// every avatar key still set on a session resolves to a stored blob.
    /// A blob that fails to delete is logged and reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if blob keys cannot be listed or clearing a dangling
    /// reference cannot be persisted.
    pub async fn clear_stale_storage(
        &self,
        bridge: &ReactiveBridge,
        blobs: &dyn BlobStorage,
    ) -> Result<CleanupReport> {
        let sessions = bridge.sessions();
        let referenced: HashSet<&str> = sessions
            .iter()
            .filter_map(|s| s.assistant_avatar_key.as_deref())
            .collect();
        let stored: BTreeSet<String> = blobs.list_keys().await?.into_iter().collect();

        let mut report = CleanupReport::default();

        for key in &stored {
            if referenced.contains(key.as_str()) {
                report.retained += 1;
                continue;
            }
            match blobs.delete(key).await {
                Ok(()) => {
                    tracing::debug!("Deleted unreferenced blob '{}'", key);
                    report.deleted.push(key.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to delete unreferenced blob '{}': {}", key, e);
                    report.failed.push(key.clone());
                }
            }
        }

        for session in &sessions {
            let Some(key) = session.assistant_avatar_key.as_deref() else {
                continue;
            };
            if !stored.contains(key) {
                tracing::warn!(
                    "Session '{}' references missing blob '{}'; falling back to the default avatar",
                    session.id,
                    key
                );
                report.orphans.push(OrphanReference {
                    session_id: session.id.clone(),
                    key: key.to_string(),
                });
            }
        }

        if !report.orphans.is_empty() {
            let orphans = &report.orphans;
            bridge
                .update(|snapshot| {
                    let mut sessions = snapshot.sessions.clone();
                    for orphan in orphans {
                        if let Some(session) = sessions.iter_mut().find(|s| s.id == orphan.session_id) {
                            if session.assistant_avatar_key.as_deref() == Some(orphan.key.as_str()) {
                                session.assistant_avatar_key = None;
                            }
                        }
                    }
                    Ok(((), vec![ProjectionValue::Sessions(sessions)]))
                })
                .await?;
        }

        tracing::info!(
            "Storage cleanup: {} deleted, {} retained, {} orphaned references cleared",
            report.deleted.len(),
            report.retained,
            report.orphans.len()
        );
        Ok(report)
    }
}
