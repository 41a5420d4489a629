//! Session domain model.
//!
//! This module contains the validated, post-migration `Session` entity.
//! Pre-migration shapes never reach this type; they live in the migration
//! layer as loosely-typed raw records.

use super::message::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Variant tag of a session, fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// A text conversation.
    #[default]
    Chat,
    /// An image-generation conversation.
    Picture,
}

impl SessionType {
    /// Returns the persisted tag for this variant.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionType::Chat => "chat",
            SessionType::Picture => "picture",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(SessionType::Chat),
            "picture" => Ok(SessionType::Picture),
            other => Err(format!("unknown session type '{}'", other)),
        }
    }
}

/// A conversation thread.
///
/// This is the "pure" domain model that session actions operate on,
/// independent of the on-disk schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier (UUID format), immutable for the record's lifetime
    pub id: String,
    /// Display name
    pub name: String,
    /// Variant tag
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Toggled by the user from the session list
    #[serde(default)]
    pub starred: bool,
    /// Weak reference into blob storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_avatar_key: Option<String>,
    /// External avatar URL, shown only when no avatar key is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
    /// Conversation content, append-mostly
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// What a session list item should display as the assistant avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar<'a> {
    /// Image held in blob storage under this key.
    Blob(&'a str),
    /// Image at an external URL.
    Url(&'a str),
    /// No image; fall back to the icon for this session type.
    Default(SessionType),
}

impl Session {
    /// Creates an empty session with a freshly generated id.
    pub fn new(session_type: SessionType, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            session_type,
            starred: false,
            assistant_avatar_key: None,
            pic_url: None,
            messages: Vec::new(),
        }
    }

    /// Resolves avatar display precedence: blob key, then URL, then the
    /// type-specific default.
    pub fn avatar(&self) -> Avatar<'_> {
        if let Some(key) = self.assistant_avatar_key.as_deref() {
            Avatar::Blob(key)
        } else if let Some(url) = self.pic_url.as_deref() {
            Avatar::Url(url)
        } else {
            Avatar::Default(self.session_type)
        }
    }

    /// Duplicates this session under a new id and a derived name.
    ///
    /// The blob reference is shared, not copied: both sessions point at the
    /// same blob key.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: format!("{} (copy)", self.name),
            ..self.clone()
        }
    }
}
