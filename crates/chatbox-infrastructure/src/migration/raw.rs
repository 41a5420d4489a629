//! Loosely-typed views of pre-migration data.
//!
//! Migration steps never see `Session` or `AppSettings`: older shapes may be
//! missing fields those types require. Instead a step works on a snapshot of
//! every repository key as `serde_json::Value` and the engine writes back
//! only what the step changed.

use chatbox_core::error::Result;
use chatbox_core::storage::Transaction;
use chatbox_core::storage::keys;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Snapshot of the repository as JSON values, keyed like the repository.
///
/// `schema-version` is owned by the engine and never appears here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawState {
    original: BTreeMap<String, Value>,
    current: BTreeMap<String, Value>,
}

impl RawState {
    /// Creates a state from in-memory values (used by tests and fixtures).
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let current: BTreeMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .filter(|(k, _)| k != keys::SCHEMA_VERSION)
            .collect();
        Self {
            original: current.clone(),
            current,
        }
    }

    /// Reads every key visible to `tx`.
    ///
    /// Values that are not JSON are left out of the snapshot; since the diff
    /// only covers keys present in the snapshot, they are never touched.
    pub fn load(tx: &Transaction<'_>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for key in tx.list_keys("")? {
            if key == keys::SCHEMA_VERSION {
                continue;
            }
            let Some(bytes) = tx.get(&key)? else {
                continue;
            };
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    entries.insert(key, value);
                }
                Err(e) => {
                    tracing::warn!("Skipping non-JSON key '{}' during migration: {}", key, e);
                }
            }
        }
        Ok(Self {
            original: entries.clone(),
            current: entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.current.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.current.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.current.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.current.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.current
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Returns every session record as a [`RawSession`], in key order.
    ///
    /// Non-object values under `session:` are skipped.
    pub fn sessions(&self) -> Vec<(String, RawSession)> {
        self.keys_with_prefix(keys::SESSION_PREFIX)
            .into_iter()
            .filter_map(|key| {
                let session = RawSession::from_value(self.current.get(&key)?.clone())?;
                Some((key, session))
            })
            .collect()
    }

    /// Changes since the snapshot was taken (`None` = delete).
    pub fn diff(&self) -> BTreeMap<String, Option<Value>> {
        let mut changes = BTreeMap::new();
        for (key, value) in &self.current {
            if self.original.get(key) != Some(value) {
                changes.insert(key.clone(), Some(value.clone()));
            }
        }
        for key in self.original.keys() {
            if !self.current.contains_key(key) {
                changes.insert(key.clone(), None);
            }
        }
        changes
    }

    /// Stages the diff into `tx`, returning the number of changed keys.
    pub fn stage(&self, tx: &mut Transaction<'_>) -> Result<usize> {
        let changes = self.diff();
        let count = changes.len();
        for (key, change) in changes {
            match change {
                Some(value) => tx.set_json(key, &value)?,
                None => tx.delete(key),
            }
        }
        Ok(count)
    }
}

/// A session record of unknown vintage, as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSession {
    fields: Map<String, Value>,
}

impl RawSession {
    /// Wraps a JSON object; `None` for anything else.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Returns the id if it is a non-empty string.
    pub fn id(&self) -> Option<&str> {
        self.str_field("id").filter(|id| !id.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Sets `field` to `default` unless it already holds a value accepted
    /// by `valid`.
    pub fn ensure(&mut self, field: &str, valid: fn(&Value) -> bool, default: Value) {
        let keep = self.fields.get(field).is_some_and(valid);
        if !keep {
            self.fields.insert(field.to_string(), default);
        }
    }

    /// Moves `from` to `to`. An existing `to` wins and `from` is dropped.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(value) = self.fields.remove(from) {
            if !self.fields.contains_key(to) {
                self.fields.insert(to.to_string(), value);
            }
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_reports_sets_and_deletes_only() {
        let mut state = RawState::from_entries([
            ("keep", json!(1)),
            ("change", json!("a")),
            ("drop", json!(true)),
        ]);

        state.insert("change", json!("b"));
        state.insert("new", json!([]));
        state.remove("drop");
        state.insert("keep", json!(1));

        let diff = state.diff();
        assert_eq!(diff.len(), 3);
        assert_eq!(diff["change"], Some(json!("b")));
        assert_eq!(diff["new"], Some(json!([])));
        assert_eq!(diff["drop"], None);
    }

    #[test]
    fn test_schema_version_is_excluded() {
        let state = RawState::from_entries([("schema-version", json!(2)), ("settings", json!({}))]);
        assert!(!state.contains("schema-version"));
        assert!(state.contains("settings"));
    }

    #[test]
    fn test_sessions_skip_non_objects() {
        let state = RawState::from_entries([
            ("session:a", json!({"id": "a"})),
            ("session:b", json!("garbage")),
            ("session-order", json!(["a"])),
        ]);

        let sessions = state.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0, "session:a");
        assert_eq!(sessions[0].1.id(), Some("a"));
    }

    #[test]
    fn test_raw_session_rename_keeps_existing_target() {
        let mut session =
            RawSession::from_value(json!({"avatarKey": "old", "assistantAvatarKey": "new"})).unwrap();
        session.rename("avatarKey", "assistantAvatarKey");
        assert_eq!(session.into_value(), json!({"assistantAvatarKey": "new"}));
    }

    #[test]
    fn test_raw_session_ensure() {
        let mut session = RawSession::from_value(json!({"starred": "yes", "name": "n"})).unwrap();
        session.ensure("starred", Value::is_boolean, json!(false));
        session.ensure("name", Value::is_string, json!("Untitled"));
        assert_eq!(session.get("starred"), Some(&json!(false)));
        assert_eq!(session.str_field("name"), Some("n"));
    }
}
