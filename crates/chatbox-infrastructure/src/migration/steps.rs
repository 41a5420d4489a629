//! Concrete schema steps, oldest first.
//!
//! | Step    | Change                                                        |
//! |---------|---------------------------------------------------------------|
//! | v0 → v1 | split `chat-sessions` into `session:<id>` + `session-order`   |
//! | v1 → v2 | normalize session fields, `avatarKey` → `assistantAvatarKey`  |
//! | v2 → v3 | fold top-level UI keys into `settings`                        |
//! | v3 → v4 | `current-session` object → `current-session-id`               |

use super::raw::{RawSession, RawState};
use super::traits::MigrationStep;
use anyhow::bail;
use chatbox_core::SchemaVersion;
use chatbox_core::storage::keys;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use uuid::Uuid;

/// Keys that only pre-versioning builds wrote.
pub mod legacy_keys {
    pub const CHAT_SESSIONS: &str = "chat-sessions";
    pub const CURRENT_SESSION: &str = "current-session";
    pub const SHOW_SIDEBAR: &str = "showSidebar";
    pub const LANGUAGE: &str = "language";
    pub const THEME: &str = "theme";

    /// Any of these without a `schema-version` marks the data as v0.
    pub const MARKERS: [&str; 3] = [CHAT_SESSIONS, CURRENT_SESSION, SHOW_SIDEBAR];
}

const DEFAULT_SESSION_NAME: &str = "Untitled";

/// Namespace for ids derived from legacy records that never had one.
const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3a2e_9d4b_4e0a_8f57_2b1c_c0de_b0a7);

/// Same record at the same position always yields the same id, so a re-run
/// step reproduces its previous output.
fn derived_id(kind: &str, position: &str, record: &Value) -> String {
    let name = format!("{}/{}/{}", kind, position, record);
    Uuid::new_v5(&LEGACY_ID_NAMESPACE, name.as_bytes()).to_string()
}

/// v0 → v1: one record per session instead of one big array.
#[derive(Debug, Default)]
pub struct SplitLegacySessionList;

impl MigrationStep for SplitLegacySessionList {
    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(0)
    }

    fn description(&self) -> &str {
        "Split legacy session list into per-session records"
    }

    fn apply(&self, state: &mut RawState) -> anyhow::Result<()> {
        let mut order = string_list(state.get(keys::SESSION_ORDER));
        let mut seen: HashSet<String> = order.iter().cloned().collect();
        seen.extend(
            state
                .keys_with_prefix(keys::SESSION_PREFIX)
                .iter()
                .filter_map(|k| keys::session_id_from_key(k).map(str::to_string)),
        );

        if let Some(legacy) = state.remove(legacy_keys::CHAT_SESSIONS) {
            let Value::Array(items) = legacy else {
                bail!("'{}' is not an array", legacy_keys::CHAT_SESSIONS);
            };

            for (index, item) in items.into_iter().enumerate() {
                let fallback_id = derived_id("session", &index.to_string(), &item);
                let Some(mut session) = RawSession::from_value(item) else {
                    tracing::warn!("Dropping legacy session #{}: not an object", index);
                    continue;
                };

                let id = match session.id() {
                    Some(id) => id.to_string(),
                    None => {
                        let id = fallback_id;
                        tracing::debug!("Assigned id {} to legacy session #{}", id, index);
                        session.set("id", json!(id));
                        id
                    }
                };

                if !seen.insert(id.clone()) {
                    tracing::warn!("Dropping duplicate legacy session '{}'", id);
                    continue;
                }

                state.insert(keys::session_key(&id), session.into_value());
                order.push(id);
            }
        }

        state.insert(keys::SESSION_ORDER, json!(order));
        Ok(())
    }
}

/// v1 → v2: every record gets the fields the current `Session` requires.
#[derive(Debug, Default)]
pub struct NormalizeSessionFields;

impl MigrationStep for NormalizeSessionFields {
    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(1)
    }

    fn description(&self) -> &str {
        "Normalize session fields and rename avatarKey"
    }

    fn apply(&self, state: &mut RawState) -> anyhow::Result<()> {
        for key in state.keys_with_prefix(keys::SESSION_PREFIX) {
            let Some(id) = keys::session_id_from_key(&key).map(str::to_string) else {
                continue;
            };
            let Some(mut session) = state.get(&key).cloned().and_then(RawSession::from_value) else {
                tracing::warn!("Dropping session record '{}': not an object", key);
                state.remove(&key);
                continue;
            };

            normalize_session(&id, &mut session);
            state.insert(key, session.into_value());
        }

        if !state.get(keys::SESSION_ORDER).is_some_and(Value::is_array) {
            let ids: Vec<String> = state
                .keys_with_prefix(keys::SESSION_PREFIX)
                .iter()
                .filter_map(|k| keys::session_id_from_key(k).map(str::to_string))
                .collect();
            state.insert(keys::SESSION_ORDER, json!(ids));
        }
        Ok(())
    }
}

fn normalize_session(id: &str, session: &mut RawSession) {
    session.set("id", json!(id));
    session.ensure("name", Value::is_string, json!(DEFAULT_SESSION_NAME));

    let picture_flag = session
        .remove("picture")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let default_type = if picture_flag { "picture" } else { "chat" };
    session.ensure("type", is_session_type, json!(default_type));

    session.ensure("starred", Value::is_boolean, json!(false));

    session.rename("avatarKey", "assistantAvatarKey");
    for field in ["assistantAvatarKey", "picUrl"] {
        let usable = session.str_field(field).is_some_and(|s| !s.is_empty());
        if !usable {
            session.remove(field);
        }
    }

    let messages = match session.remove("messages") {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| normalize_message(id, index, item))
            .collect(),
        _ => Vec::new(),
    };
    session.set("messages", Value::Array(messages));
}

fn is_session_type(value: &Value) -> bool {
    matches!(value.as_str(), Some("chat" | "picture"))
}

fn normalize_message(session_id: &str, index: usize, value: Value) -> Option<Value> {
    if !value.is_object() {
        return None;
    }
    let id = derived_id("message", &format!("{}/{}", session_id, index), &value);
    let Value::Object(mut message) = value else {
        return None;
    };

    if !message.get("id").and_then(Value::as_str).is_some_and(|s| !s.is_empty()) {
        message.insert("id".to_string(), json!(id));
    }
    if !matches!(
        message.get("role").and_then(Value::as_str),
        Some("system" | "user" | "assistant")
    ) {
        message.insert("role".to_string(), json!("user"));
    }
    if !message.get("content").is_some_and(Value::is_string) {
        message.insert("content".to_string(), json!(""));
    }

    let timestamp = normalize_timestamp(message.get("timestamp"));
    message.insert("timestamp".to_string(), json!(timestamp.to_rfc3339()));
    Some(Value::Object(message))
}

/// Legacy timestamps are epoch milliseconds; unreadable ones become the epoch.
fn normalize_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_default(),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    }
}

/// v2 → v3: scattered UI keys become fields of the `settings` record.
#[derive(Debug, Default)]
pub struct FoldLegacySettings;

impl MigrationStep for FoldLegacySettings {
    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(2)
    }

    fn description(&self) -> &str {
        "Fold legacy top-level UI keys into settings"
    }

    fn apply(&self, state: &mut RawState) -> anyhow::Result<()> {
        let mut settings = match state.remove(keys::SETTINGS) {
            Some(Value::Object(fields)) => fields,
            Some(other) => {
                tracing::warn!("Resetting settings record of unexpected shape: {}", other);
                Map::new()
            }
            None => Map::new(),
        };

        // Existing settings fields win over the legacy keys
        let folds = [
            (legacy_keys::SHOW_SIDEBAR, "showSidebar"),
            (legacy_keys::LANGUAGE, "language"),
            (legacy_keys::THEME, "theme"),
        ];
        for (legacy_key, field) in folds {
            if let Some(value) = state.remove(legacy_key) {
                if !settings.contains_key(field) {
                    settings.insert(field.to_string(), value);
                }
            }
        }

        sanitize_settings(&mut settings);
        state.insert(keys::SETTINGS, Value::Object(settings));
        Ok(())
    }
}

fn sanitize_settings(settings: &mut Map<String, Value>) {
    if !settings.get("showSidebar").is_some_and(Value::is_boolean) {
        settings.remove("showSidebar");
    }
    if !settings.get("language").is_some_and(Value::is_string) {
        settings.remove("language");
    }
    match settings.get("theme").and_then(normalize_theme) {
        Some(theme) => {
            settings.insert("theme".to_string(), json!(theme));
        }
        None => {
            settings.remove("theme");
        }
    }
}

/// Older builds stored the theme as a numeric enum (0 dark, 1 light, 2 system).
fn normalize_theme(value: &Value) -> Option<&'static str> {
    match value {
        Value::Number(n) => match n.as_u64()? {
            0 => Some("dark"),
            1 => Some("light"),
            2 => Some("system"),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "dark" => Some("dark"),
            "light" => Some("light"),
            "system" => Some("system"),
            _ => None,
        },
        _ => None,
    }
}

/// v3 → v4: the current session is stored by id, not embedded.
#[derive(Debug, Default)]
pub struct CurrentSessionPointer;

impl MigrationStep for CurrentSessionPointer {
    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(3)
    }

    fn description(&self) -> &str {
        "Replace embedded current session with current-session-id"
    }

    fn apply(&self, state: &mut RawState) -> anyhow::Result<()> {
        let legacy_id = state
            .remove(legacy_keys::CURRENT_SESSION)
            .and_then(RawSession::from_value)
            .and_then(|s| s.id().map(str::to_string));
        let existing_id = state
            .get(keys::CURRENT_SESSION_ID)
            .and_then(Value::as_str)
            .map(str::to_string);

        match existing_id.or(legacy_id) {
            Some(id) if state.contains(&keys::session_key(&id)) => {
                state.insert(keys::CURRENT_SESSION_ID, json!(id));
            }
            Some(id) => {
                tracing::warn!("Dropping current session pointer to missing session '{}'", id);
                state.remove(keys::CURRENT_SESSION_ID);
            }
            None => {
                state.remove(keys::CURRENT_SESSION_ID);
            }
        }
        Ok(())
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::AppSettings;
    use chatbox_core::session::{Session, SessionType};

    #[test]
    fn test_split_assigns_ids_and_drops_duplicates() {
        let mut state = RawState::from_entries([(
            "chat-sessions",
            json!([
                {"id": "a", "name": "First"},
                {"name": "No id"},
                {"id": "a", "name": "Duplicate"},
                "not an object"
            ]),
        )]);

        SplitLegacySessionList.apply(&mut state).unwrap();

        assert!(!state.contains("chat-sessions"));
        let order = string_list(state.get("session-order"));
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], "a");
        assert_eq!(state.get("session:a").unwrap()["name"], "First");

        let generated = &order[1];
        assert!(Uuid::parse_str(generated).is_ok());
        assert_eq!(state.get(&keys::session_key(generated)).unwrap()["id"], json!(generated));
    }

    #[test]
    fn test_rerunning_a_step_on_the_same_input_is_deterministic() {
        let input = RawState::from_entries([
            (
                "chat-sessions",
                json!([
                    {"name": "no id", "messages": [{"content": "no id either"}]},
                    {"name": "no id"}
                ]),
            ),
            ("current-session", json!({"name": "no id"})),
            ("showSidebar", json!(false)),
        ]);

        let run = |mut state: RawState| {
            for step in [
                &SplitLegacySessionList as &dyn MigrationStep,
                &NormalizeSessionFields,
                &FoldLegacySettings,
                &CurrentSessionPointer,
            ] {
                let before = state.clone();
                let mut again = state.clone();
                step.apply(&mut state).unwrap();
                step.apply(&mut again).unwrap();
                assert_eq!(state, again, "{} differs between runs", step.description());
                assert_ne!(state, before);
            }
            state
        };

        let first = run(input.clone());
        let second = run(input);
        assert_eq!(first, second);

        let order = string_list(first.get("session-order"));
        assert_eq!(order.len(), 2);
        assert_ne!(order[0], order[1]);
        let messages = &first.get(&keys::session_key(&order[0])).unwrap()["messages"];
        assert!(Uuid::parse_str(messages[0]["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_split_rejects_non_array() {
        let mut state = RawState::from_entries([("chat-sessions", json!({"oops": true}))]);
        assert!(SplitLegacySessionList.apply(&mut state).is_err());
    }

    #[test]
    fn test_split_without_legacy_list_creates_empty_order() {
        let mut state = RawState::from_entries([("showSidebar", json!(false))]);
        SplitLegacySessionList.apply(&mut state).unwrap();
        assert_eq!(state.get("session-order"), Some(&json!([])));
    }

    #[test]
    fn test_normalize_produces_valid_sessions() {
        let mut state = RawState::from_entries([
            (
                "session:a",
                json!({
                    "id": "a",
                    "avatarKey": "avatar-1",
                    "picture": true,
                    "messages": [
                        {"id": "m1", "role": "assistant", "content": "hi", "timestamp": 1700000000000i64},
                        {"role": "robot"},
                        42
                    ]
                }),
            ),
            ("session:b", json!({"name": "Kept", "type": "chat", "starred": true, "picUrl": ""})),
            ("session:c", json!(null)),
            ("session-order", json!(["a", "b"])),
        ]);

        NormalizeSessionFields.apply(&mut state).unwrap();

        let a: Session = serde_json::from_value(state.get("session:a").unwrap().clone()).unwrap();
        assert_eq!(a.name, "Untitled");
        assert_eq!(a.session_type, SessionType::Picture);
        assert!(!a.starred);
        assert_eq!(a.assistant_avatar_key.as_deref(), Some("avatar-1"));
        assert_eq!(a.messages.len(), 2);
        assert_eq!(a.messages[0].timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(a.messages[1].content, "");

        let b: Session = serde_json::from_value(state.get("session:b").unwrap().clone()).unwrap();
        assert_eq!(b.id, "b");
        assert_eq!(b.name, "Kept");
        assert!(b.starred);
        assert_eq!(b.pic_url, None);

        assert!(!state.contains("session:c"));
    }

    #[test]
    fn test_fold_settings_existing_fields_win() {
        let mut state = RawState::from_entries([
            ("settings", json!({"language": "fr"})),
            ("showSidebar", json!(false)),
            ("language", json!("en")),
            ("theme", json!(0)),
        ]);

        FoldLegacySettings.apply(&mut state).unwrap();

        assert!(!state.contains("showSidebar"));
        assert!(!state.contains("language"));
        assert!(!state.contains("theme"));

        let settings: AppSettings =
            serde_json::from_value(state.get("settings").unwrap().clone()).unwrap();
        assert!(!settings.show_sidebar);
        assert_eq!(settings.language.as_deref(), Some("fr"));
        assert_eq!(settings.theme, chatbox_core::settings::Theme::Dark);
    }

    #[test]
    fn test_fold_settings_drops_invalid_values() {
        let mut state = RawState::from_entries([("showSidebar", json!("yes")), ("theme", json!("neon"))]);
        FoldLegacySettings.apply(&mut state).unwrap();
        assert_eq!(state.get("settings"), Some(&json!({})));
    }

    #[test]
    fn test_current_session_pointer() {
        let mut state = RawState::from_entries([
            ("session:a", json!({"id": "a"})),
            ("current-session", json!({"id": "a", "name": "embedded copy"})),
        ]);
        CurrentSessionPointer.apply(&mut state).unwrap();
        assert!(!state.contains("current-session"));
        assert_eq!(state.get("current-session-id"), Some(&json!("a")));
    }

    #[test]
    fn test_current_session_pointer_to_missing_session_is_dropped() {
        let mut state = RawState::from_entries([("current-session", json!({"id": "gone"}))]);
        CurrentSessionPointer.apply(&mut state).unwrap();
        assert!(!state.contains("current-session"));
        assert!(!state.contains("current-session-id"));
    }

    #[test]
    fn test_steps_are_idempotent_on_their_output() {
        let mut state = RawState::from_entries([
            ("session:a", json!({"id": "a", "name": "A", "type": "chat", "starred": false, "messages": []})),
            ("session-order", json!(["a"])),
            ("settings", json!({"showSidebar": true})),
            ("current-session-id", json!("a")),
        ]);

        NormalizeSessionFields.apply(&mut state).unwrap();
        FoldLegacySettings.apply(&mut state).unwrap();
        CurrentSessionPointer.apply(&mut state).unwrap();
        let once = state.clone();

        NormalizeSessionFields.apply(&mut state).unwrap();
        FoldLegacySettings.apply(&mut state).unwrap();
        CurrentSessionPointer.apply(&mut state).unwrap();
        assert_eq!(state, once);
    }
}
