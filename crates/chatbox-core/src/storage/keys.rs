//! Repository key layout of the current schema.
//!
//! ```text
//! schema-version        -> JSON integer
//! settings              -> AppSettings
//! session-order         -> [session id, ...]
//! session:<id>          -> Session
//! current-session-id    -> JSON string (absent when none)
//! ```

pub const SCHEMA_VERSION: &str = "schema-version";
pub const SETTINGS: &str = "settings";
pub const SESSION_ORDER: &str = "session-order";
pub const SESSION_PREFIX: &str = "session:";
pub const CURRENT_SESSION_ID: &str = "current-session-id";

/// Returns the record key for a session id.
pub fn session_key(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

/// Extracts the session id from a record key, if it is one.
pub fn session_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(SESSION_PREFIX)
}
