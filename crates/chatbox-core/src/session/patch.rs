//! Partial session updates.

use super::model::Session;

/// A partial update merged into an existing session by id.
///
/// `None` leaves a field untouched. For clearable fields the inner option
/// distinguishes "set" (`Some(Some(v))`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub id: String,
    pub name: Option<String>,
    pub starred: Option<bool>,
    pub assistant_avatar_key: Option<Option<String>>,
    pub pic_url: Option<Option<String>>,
}

impl SessionPatch {
    /// Starts an empty patch for the given session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = Some(starred);
        self
    }

    pub fn assistant_avatar_key(mut self, key: Option<String>) -> Self {
        self.assistant_avatar_key = Some(key);
        self
    }

    pub fn pic_url(mut self, url: Option<String>) -> Self {
        self.pic_url = Some(url);
        self
    }

    /// Returns true if applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.starred.is_none()
            && self.assistant_avatar_key.is_none()
            && self.pic_url.is_none()
    }

    /// Merges the patch into `session`. The id is never changed.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(name) = &self.name {
            session.name = name.clone();
        }
        if let Some(starred) = self.starred {
            session.starred = starred;
        }
        if let Some(key) = &self.assistant_avatar_key {
            session.assistant_avatar_key = key.clone();
        }
        if let Some(url) = &self.pic_url {
            session.pic_url = url.clone();
        }
    }
}
