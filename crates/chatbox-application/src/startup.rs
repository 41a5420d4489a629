//! Startup sequencing.
//!
//! ```text
//! StoreBootstrap ──migrate()──► MigratedStore ──hydrate()──► HydratedStore ──clear_stale_storage()──► ChatStore
//! ```
//!
//! Each stage consumes the previous one, so the bridge cannot be built
//! before migration finishes and cleanup cannot run twice.

use crate::bridge::ReactiveBridge;
use crate::gc::{CleanupReport, StorageCleaner};
use crate::store::ChatStore;
use chatbox_core::error::Result;
use chatbox_core::storage::{BlobStorage, Repository};
use chatbox_infrastructure::migration::{self, MigrationEngine, MigrationReport};
use std::sync::Arc;

/// First stage: storage opened, nothing read yet.
pub struct StoreBootstrap {
    repository: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStorage>,
    engine: MigrationEngine,
}

impl StoreBootstrap {
    pub fn new(repository: Arc<dyn Repository>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self {
            repository,
            blobs,
            engine: migration::default_engine(),
        }
    }

    /// Replaces the migration engine (tests register extra steps this way).
    pub fn with_engine(mut self, engine: MigrationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Brings the repository to the latest schema.
    ///
    /// # Errors
    ///
    /// `SchemaTooNew` or `MigrationStepFailed` stop startup; the repository
    /// keeps whatever steps completed.
    pub async fn migrate(self) -> Result<MigratedStore> {
        let report = self.engine.migrate(self.repository.as_ref()).await?;
        Ok(MigratedStore {
            repository: self.repository,
            blobs: self.blobs,
            report,
        })
    }
}

/// Second stage: the repository holds the latest schema.
pub struct MigratedStore {
    repository: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStorage>,
    report: MigrationReport,
}

impl MigratedStore {
    pub fn migration_report(&self) -> &MigrationReport {
        &self.report
    }

    /// Loads the bridge from the migrated repository.
    pub async fn hydrate(self) -> Result<HydratedStore> {
        let bridge = ReactiveBridge::hydrate(self.repository).await?;
        Ok(HydratedStore {
            bridge: Arc::new(bridge),
            blobs: self.blobs,
            migration: self.report,
        })
    }
}

/// Third stage: the bridge is live, storage not yet reconciled.
pub struct HydratedStore {
    bridge: Arc<ReactiveBridge>,
    blobs: Arc<dyn BlobStorage>,
    migration: MigrationReport,
}

impl HydratedStore {
    pub fn bridge(&self) -> &Arc<ReactiveBridge> {
        &self.bridge
    }

    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// Runs the startup cleanup and hands over the ready store.
    pub async fn clear_stale_storage(self) -> Result<ChatStore> {
        let cleanup: CleanupReport = StorageCleaner::new()
            .clear_stale_storage(&self.bridge, self.blobs.as_ref())
            .await?;
        Ok(ChatStore::new(self.bridge, self.blobs, self.migration, cleanup))
    }
}
