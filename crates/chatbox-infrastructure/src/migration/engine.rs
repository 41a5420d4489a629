//! Startup migration runner.
//!
//! Brings a repository from whatever schema version it holds to the latest
//! one. Each step runs inside a single repository transaction that also
//! stamps `schema-version`, so an interrupted run resumes from the last
//! completed step.

use super::raw::RawState;
use super::registry::MigrationRegistry;
use super::steps::legacy_keys;
use chatbox_core::SchemaVersion;
use chatbox_core::error::{Result, StoreError};
use chatbox_core::storage::{Repository, RepositoryExt, keys};

/// One step the engine applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub description: String,
    /// Number of repository keys the step set or deleted.
    pub changed_keys: usize,
}

/// Outcome of [`MigrationEngine::migrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found on disk (`v0` for legacy data).
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub applied: Vec<AppliedStep>,
    /// The repository was empty and was stamped with the latest version.
    pub fresh_install: bool,
}

impl MigrationReport {
    /// Returns true if nothing was written.
    pub fn is_noop(&self) -> bool {
        !self.fresh_install && self.applied.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MigrationEngine {
    registry: MigrationRegistry,
}

impl MigrationEngine {
    pub fn new(registry: MigrationRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn latest_version(&self) -> SchemaVersion {
        self.registry.latest_version()
    }

    /// Reads the persisted version without migrating.
    pub async fn stored_version<R>(&self, repo: &R) -> Result<Option<SchemaVersion>>
    where
        R: Repository + ?Sized,
    {
        repo.get_json(keys::SCHEMA_VERSION).await
    }

    /// Runs every pending step in order.
    ///
    /// # Errors
    ///
    /// - `SchemaTooNew` if the repository was written by a newer build
    /// - `MigrationStepFailed` if a step rejects the data; the repository
    ///   stays at the last completed version
    /// - `StorageUnavailable` if the medium cannot be read or written
    pub async fn migrate<R>(&self, repo: &R) -> Result<MigrationReport>
    where
        R: Repository + ?Sized,
    {
        let latest = self.latest_version();

        let from = match self.stored_version(repo).await? {
            Some(version) => version,
            None => {
                let existing = repo.list_keys("").await?;
                if existing.is_empty() {
                    tracing::info!("Fresh install, stamping schema {}", latest);
                    repo.set_json(keys::SCHEMA_VERSION, &latest).await?;
                    return Ok(MigrationReport {
                        from: latest,
                        to: latest,
                        applied: Vec::new(),
                        fresh_install: true,
                    });
                }

                let markers: Vec<&str> = legacy_keys::MARKERS
                    .iter()
                    .copied()
                    .filter(|marker| existing.iter().any(|k| k == marker))
                    .collect();
                tracing::info!(
                    "No schema version found; treating {} existing keys as {} (legacy markers: {:?})",
                    existing.len(),
                    SchemaVersion::INITIAL,
                    markers
                );
                SchemaVersion::INITIAL
            }
        };

        if from > latest {
            return Err(StoreError::SchemaTooNew {
                found: from.get(),
                supported: latest.get(),
            });
        }

        if from == latest {
            tracing::debug!("Schema is already at the latest version ({}), no migration needed", from);
            return Ok(MigrationReport {
                from,
                to: latest,
                applied: Vec::new(),
                fresh_install: false,
            });
        }

        let steps = self.registry.path_from(from).ok_or_else(|| {
            StoreError::internal(format!(
                "No complete migration path from schema {} to {}",
                from, latest
            ))
        })?;

        tracing::info!(
            "Starting migration from {} to {} ({} steps)",
            from,
            latest,
            steps.len()
        );

        let mut applied = Vec::with_capacity(steps.len());
        for step in steps {
            let step = step.as_ref();
            let step_from = step.from_version();
            let step_to = step.to_version();
            let step_failed = |message: String| StoreError::MigrationStepFailed {
                from: step_from.get(),
                to: step_to.get(),
                description: step.description().to_string(),
                message,
            };

            tracing::info!("Applying migration {} -> {}: {}", step_from, step_to, step.description());

            let mut changed_keys = 0;
            let outcome = repo
                .transaction(|tx| {
                    let mut state = RawState::load(tx)?;
                    step.apply(&mut state)
                        .map_err(|e| step_failed(format!("{:#}", e)))?;
                    changed_keys = state.stage(tx)?;
                    tx.set_json(keys::SCHEMA_VERSION, &step_to)?;
                    Ok(())
                })
                .await;

            match outcome {
                Ok(()) => {}
                Err(e @ StoreError::MigrationStepFailed { .. }) => {
                    tracing::warn!("Migration halted at {}: {}", step_from, e);
                    return Err(e);
                }
                Err(e @ StoreError::StorageUnavailable(_)) => {
                    tracing::warn!("Migration halted at {}: {}", step_from, e);
                    return Err(e);
                }
                Err(other) => {
                    tracing::warn!("Migration halted at {}: {}", step_from, other);
                    return Err(step_failed(other.to_string()));
                }
            }

            tracing::debug!("Migration {} -> {} changed {} keys", step_from, step_to, changed_keys);
            applied.push(AppliedStep {
                from: step_from,
                to: step_to,
                description: step.description().to_string(),
                changed_keys,
            });
        }

        let reached = applied.last().map_or(from, |step| step.to);
        tracing::info!("Migration completed: {} -> {}", from, reached);
        Ok(MigrationReport {
            from,
            to: reached,
            applied,
            fresh_install: false,
        })
    }
}
