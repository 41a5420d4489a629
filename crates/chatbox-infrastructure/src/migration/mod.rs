//! Schema migration framework for the session store.
//!
//! The repository carries a single `schema-version` integer. At startup the
//! [`MigrationEngine`] walks the linear chain of [`MigrationStep`]s from the
//! stored version to [`LATEST_SCHEMA_VERSION`]:
//!
//! ```text
//!  repository ──► RawState snapshot ──► step.apply() ──► diff + version ──► transact
//!       ▲                                                                     │
//!       └─────────────────────────── next step ◄─────────────────────────────┘
//! ```
//!
//! - Steps run strictly in order; none is skipped
//! - Each step commits together with its version stamp
//! - Data written by a newer build is refused, never downgraded
//!
//! # Adding a Step
//!
//! 1. Implement [`MigrationStep`] in `steps.rs` with `from_version()` equal
//!    to the current latest
//! 2. Bump [`LATEST_SCHEMA_VERSION`]
//! 3. Register it in [`build_migration_registry`]
//! 4. Update `Session`/`AppSettings` if the current shape changed
//!
//! The registry panics at startup if the chain is broken.

mod engine;
mod raw;
mod registry;
mod steps;
mod traits;

pub use engine::{AppliedStep, MigrationEngine, MigrationReport};
pub use raw::{RawSession, RawState};
pub use registry::MigrationRegistry;
pub use steps::{
    CurrentSessionPointer, FoldLegacySettings, NormalizeSessionFields, SplitLegacySessionList,
    legacy_keys,
};
pub use traits::MigrationStep;

use chatbox_core::SchemaVersion;
use std::sync::Arc;

/// The schema version this build reads and writes.
pub const LATEST_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(4);

/// Builds the registry holding every known step.
pub fn build_migration_registry() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new(LATEST_SCHEMA_VERSION);
    registry.register_all(vec![
        Arc::new(SplitLegacySessionList),
        Arc::new(NormalizeSessionFields),
        Arc::new(FoldLegacySettings),
        Arc::new(CurrentSessionPointer),
    ]);
    registry
}

/// Creates an engine over [`build_migration_registry`].
pub fn default_engine() -> MigrationEngine {
    MigrationEngine::new(build_migration_registry())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reaches_latest_from_initial() {
        let registry = build_migration_registry();
        assert_eq!(registry.start_version(), Some(SchemaVersion::INITIAL));
        let path = registry.available_path(SchemaVersion::INITIAL);
        assert_eq!(path.last(), Some(&LATEST_SCHEMA_VERSION));
        assert_eq!(path.len(), LATEST_SCHEMA_VERSION.get() as usize + 1);
    }
}
