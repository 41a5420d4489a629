//! Migration registry for the linear schema chain.
//!
//! Every version must migrate through all intermediate versions. This keeps
//! each step small and makes a half-upgraded repository easy to reason about.

use super::traits::MigrationStep;
use chatbox_core::SchemaVersion;
use std::sync::Arc;

/// Registry for a linear chain of migration steps.
///
/// Steps are stored in order and must form a continuous chain:
/// v0 → v1 → v2 → ...
///
/// When adding steps via `register()`, the registry validates that each new
/// step's `from_version()` matches the previous step's `to_version()`.
///
/// # Example
///
/// ```ignore
/// let mut registry = MigrationRegistry::new(SchemaVersion::new(2));
/// registry.register(Arc::new(SplitLegacySessionList)); // v0 → v1
/// registry.register(Arc::new(NormalizeSessionFields)); // v1 → v2
/// ```
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    /// Steps in order, forming a linear chain.
    steps: Vec<Arc<dyn MigrationStep>>,
    /// The latest version this registry can migrate to.
    latest_version: SchemaVersion,
}

impl MigrationRegistry {
    pub fn new(latest_version: SchemaVersion) -> Self {
        Self {
            steps: Vec::new(),
            latest_version,
        }
    }

    /// Registers a single step, validating chain continuity.
    ///
    /// # Panics
    ///
    /// Panics if the step doesn't connect to the existing chain, or if it
    /// targets a version beyond the registry's latest version. Both are
    /// programming errors.
    pub fn register(&mut self, step: Arc<dyn MigrationStep>) {
        if let Some(last) = self.steps.last() {
            assert_eq!(
                last.to_version(),
                step.from_version(),
                "Migration chain broken: expected step from {} (previous to_version), but got step from {}. \
                 Description: '{}' (previous) -> '{}' (current)",
                last.to_version(),
                step.from_version(),
                last.description(),
                step.description()
            );
        }

        if step.to_version() > self.latest_version {
            panic!(
                "Migration target version {} exceeds registry's latest version {}",
                step.to_version(),
                self.latest_version
            );
        }

        self.steps.push(step);
    }

    /// Registers multiple steps at once, in order.
    ///
    /// # Panics
    ///
    /// Panics if any step breaks the chain continuity.
    pub fn register_all(&mut self, steps: Vec<Arc<dyn MigrationStep>>) {
        for step in steps {
            self.register(step);
        }
    }

    pub fn latest_version(&self) -> SchemaVersion {
        self.latest_version
    }

    /// Returns the starting version of the first step, if any.
    pub fn start_version(&self) -> Option<SchemaVersion> {
        self.steps.first().map(|s| s.from_version())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns the steps needed to bring `from` to the latest version.
    ///
    /// `None` if no registered step starts at `from` (and `from` is not
    /// already the latest), or if the chain stops short of the latest.
    pub fn path_from(&self, from: SchemaVersion) -> Option<&[Arc<dyn MigrationStep>]> {
        if from == self.latest_version {
            return Some(&[]);
        }
        let start = self.steps.iter().position(|s| s.can_migrate(from))?;
        let path = &self.steps[start..];
        path.last()
            .is_some_and(|s| s.to_version() == self.latest_version)
            .then_some(path)
    }

    /// Returns the version path from `from` to the latest, for diagnostics.
    pub fn available_path(&self, from: SchemaVersion) -> Vec<SchemaVersion> {
        let Some(steps) = self.path_from(from) else {
            return Vec::new();
        };
        let mut path = vec![from];
        path.extend(steps.iter().map(|s| s.to_version()));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::raw::RawState;

    #[derive(Debug)]
    struct MockStep {
        from: u32,
        desc: &'static str,
    }

    impl MigrationStep for MockStep {
        fn from_version(&self) -> SchemaVersion {
            SchemaVersion::new(self.from)
        }

        fn description(&self) -> &str {
            self.desc
        }

        fn apply(&self, _state: &mut RawState) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn step(from: u32, desc: &'static str) -> Arc<dyn MigrationStep> {
        Arc::new(MockStep { from, desc })
    }

    #[test]
    fn test_empty_registry() {
        let registry = MigrationRegistry::new(SchemaVersion::INITIAL);
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.available_path(SchemaVersion::INITIAL), vec![SchemaVersion::INITIAL]);
    }

    #[test]
    fn test_register_chain() {
        let mut registry = MigrationRegistry::new(SchemaVersion::new(2));
        registry.register_all(vec![step(0, "first"), step(1, "second")]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.start_version(), Some(SchemaVersion::INITIAL));
        assert_eq!(registry.path_from(SchemaVersion::new(1)).unwrap().len(), 1);
        assert_eq!(registry.path_from(SchemaVersion::new(2)).unwrap().len(), 0);
    }

    #[test]
    #[should_panic(expected = "Migration chain broken")]
    fn test_register_broken_chain() {
        let mut registry = MigrationRegistry::new(SchemaVersion::new(4));
        registry.register(step(0, "first"));
        // 1 != 2
        registry.register(step(2, "second (broken)"));
    }

    #[test]
    #[should_panic(expected = "exceeds registry's latest version")]
    fn test_register_beyond_latest() {
        let mut registry = MigrationRegistry::new(SchemaVersion::new(1));
        registry.register(step(1, "too far"));
    }

    #[test]
    fn test_available_path() {
        let mut registry = MigrationRegistry::new(SchemaVersion::new(3));
        registry.register_all(vec![step(0, "a"), step(1, "b"), step(2, "c")]);

        assert_eq!(
            registry.available_path(SchemaVersion::new(1)),
            vec![SchemaVersion::new(1), SchemaVersion::new(2), SchemaVersion::new(3)]
        );
        assert!(registry.available_path(SchemaVersion::new(7)).is_empty());
    }

    #[test]
    fn test_chain_ending_below_latest_has_no_path() {
        let mut registry = MigrationRegistry::new(SchemaVersion::new(3));
        registry.register_all(vec![step(0, "a"), step(1, "b")]);

        assert!(registry.path_from(SchemaVersion::INITIAL).is_none());
        assert!(registry.path_from(SchemaVersion::new(1)).is_none());
        assert!(registry.available_path(SchemaVersion::INITIAL).is_empty());
        assert_eq!(registry.path_from(SchemaVersion::new(3)).unwrap().len(), 0);
    }
}
