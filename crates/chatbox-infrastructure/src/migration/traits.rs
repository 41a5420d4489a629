//! Core trait for the migration framework.

use super::raw::RawState;
use chatbox_core::SchemaVersion;

/// A single schema transition.
///
/// Implementations transform the whole repository snapshot from
/// `from_version()` to `to_version()`. A step must be deterministic in what it
/// keeps and drops, so re-running it on the same starting data yields the
/// same shape.
pub trait MigrationStep: Send + Sync + std::fmt::Debug {
    /// Returns the source version this step starts from.
    fn from_version(&self) -> SchemaVersion;

    /// Returns the target version this step produces.
    fn to_version(&self) -> SchemaVersion {
        self.from_version().next()
    }

    /// Checks if this step can be applied to the given version.
    fn can_migrate(&self, version: SchemaVersion) -> bool {
        version == self.from_version()
    }

    /// Returns a human-readable description of this step.
    ///
    /// Used for logging and in `MigrationStepFailed` errors.
    fn description(&self) -> &str;

    /// Transforms the snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be brought to `to_version()`; the
    /// engine then discards every change the step made.
    fn apply(&self, state: &mut RawState) -> anyhow::Result<()>;
}
