//! Persisted schema version marker.

use serde::{Deserialize, Serialize};

/// Which migration steps have been applied to the repository.
///
/// Monotonically non-decreasing: migrations never run backward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// The earliest known shape (also used for pre-versioning legacy data).
    pub const INITIAL: SchemaVersion = SchemaVersion(0);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&SchemaVersion::new(3)).unwrap(), "3");
        let parsed: SchemaVersion = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, SchemaVersion(2));
    }

    #[test]
    fn test_ordering_and_next() {
        assert!(SchemaVersion::INITIAL < SchemaVersion::INITIAL.next());
        assert_eq!(SchemaVersion(4).to_string(), "v4");
    }
}
