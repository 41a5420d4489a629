//! Error types for the Chatbox session store.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the whole session store.
///
/// Every layer (repositories, migrations, the bridge and session actions)
/// reports failures through this enum so callers can match on the category
/// instead of parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum StoreError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A migration step failed; the repository stays at `from`.
    #[error("Migration step {from} -> {to} ({description}) failed: {message}")]
    MigrationStepFailed {
        from: u32,
        to: u32,
        description: String,
        message: String,
    },

    /// Persisted data was written by a newer build than this one understands.
    #[error("Schema version {found} is newer than the latest supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// The persistence medium is inaccessible (I/O, permissions, quota, lock held)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a StorageUnavailable error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a JSON serialization error for a specific repository key
    pub fn corrupt_json(key: &str, message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: format!("{}: {}", key, message),
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a StorageUnavailable error
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns true for errors that must stop the startup sequence before the
    /// bridge is hydrated.
    pub fn is_fatal_to_startup(&self) -> bool {
        matches!(
            self,
            Self::MigrationStepFailed { .. } | Self::SchemaTooNew { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, StoreError>`.
pub type Result<T> = std::result::Result<T, StoreError>;
