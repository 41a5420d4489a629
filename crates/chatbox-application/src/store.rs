//! The ready-to-use session store handed to the UI.

use crate::actions::SessionActions;
use crate::bridge::ReactiveBridge;
use crate::gc::CleanupReport;
use crate::startup::StoreBootstrap;
use chatbox_core::error::Result;
use chatbox_core::session::{Avatar, Session, SessionType};
use chatbox_core::storage::{BlobStorage, DisplaySource, Repository};
use chatbox_infrastructure::migration::MigrationReport;
use chatbox_infrastructure::{
    FileBlobStorage, FileRepository, MemoryBlobStorage, MemoryRepository, StorageBackend,
    StoreConfig,
};
use std::sync::Arc;

/// What to draw as a session's assistant avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarDisplay {
    /// A stored blob, ready to render.
    Blob(DisplaySource),
    /// An external image URL.
    Url(String),
    /// The built-in icon for the session type.
    Default(SessionType),
}

/// Opens the repository and blob storage selected by `config`.
pub fn open_backends(config: &StoreConfig) -> Result<(Arc<dyn Repository>, Arc<dyn BlobStorage>)> {
    match config.storage.backend {
        StorageBackend::File => {
            let paths = config.paths();
            let store_dir = paths.store_dir()?;
            let blobs_dir = paths.blobs_dir()?;
            tracing::debug!("Opening file storage: store={:?}, blobs={:?}", store_dir, blobs_dir);

            let repository = FileRepository::open(&store_dir)?;
            let blobs = FileBlobStorage::open(&blobs_dir)?;
            Ok((Arc::new(repository), Arc::new(blobs)))
        }
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory storage; nothing will persist");
            Ok((Arc::new(MemoryRepository::new()), Arc::new(MemoryBlobStorage::new())))
        }
    }
}

/// The session store after migration, hydration and cleanup.
pub struct ChatStore {
    bridge: Arc<ReactiveBridge>,
    actions: SessionActions,
    blobs: Arc<dyn BlobStorage>,
    migration: MigrationReport,
    cleanup: CleanupReport,
}

impl ChatStore {
    pub(crate) fn new(
        bridge: Arc<ReactiveBridge>,
        blobs: Arc<dyn BlobStorage>,
        migration: MigrationReport,
        cleanup: CleanupReport,
    ) -> Self {
        Self {
            actions: SessionActions::new(bridge.clone()),
            bridge,
            blobs,
            migration,
            cleanup,
        }
    }

    /// Opens storage per `config` and runs the whole startup sequence.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let (repository, blobs) = open_backends(config)?;
        Self::open_with(repository, blobs).await
    }

    /// Runs the whole startup sequence over already-opened storage.
    pub async fn open_with(
        repository: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Result<Self> {
        StoreBootstrap::new(repository, blobs)
            .migrate()
            .await?
            .hydrate()
            .await?
            .clear_stale_storage()
            .await
    }

    pub fn bridge(&self) -> &Arc<ReactiveBridge> {
        &self.bridge
    }

    pub fn actions(&self) -> &SessionActions {
        &self.actions
    }

    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    pub fn cleanup_report(&self) -> &CleanupReport {
        &self.cleanup
    }

    /// Stores avatar bytes under `key` so a session can reference it.
    pub async fn put_avatar(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.put(key, bytes).await
    }

    /// Resolves what to display as `session`'s avatar.
    ///
    /// A blob key that no longer resolves falls through to the URL and then
    /// to the default icon.
    pub async fn resolve_avatar(&self, session: &Session) -> Result<AvatarDisplay> {
        if let Avatar::Blob(key) = session.avatar() {
            if let Some(source) = self.blobs.resolve(key).await? {
                return Ok(AvatarDisplay::Blob(source));
            }
            tracing::debug!("Avatar blob '{}' of session {} is missing", key, session.id);
        }

        Ok(match &session.pic_url {
            Some(url) => AvatarDisplay::Url(url.clone()),
            None => AvatarDisplay::Default(session.session_type),
        })
    }

    /// Persists anything written through the bridge but not yet flushed.
    pub async fn close(self) -> Result<()> {
        self.bridge.flush().await
    }
}
