//! Session actions.
//!
//! The operations the UI performs on sessions. Every action is a single
//! read-modify-write through [`ReactiveBridge::update`], so it is persisted
//! before anyone observes it and fails without side effects.

use crate::bridge::{ProjectionValue, ReactiveBridge};
use chatbox_core::error::{Result, StoreError};
use chatbox_core::session::{Message, Session, SessionPatch, SessionType};
use std::sync::Arc;

const ENTITY_SESSION: &str = "session";

/// Use cases over the session list, the current-session pointer and settings.
#[derive(Debug, Clone)]
pub struct SessionActions {
    bridge: Arc<ReactiveBridge>,
}

impl SessionActions {
    pub fn new(bridge: Arc<ReactiveBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<ReactiveBridge> {
        &self.bridge
    }

    /// Makes `id` the current session.
    ///
    /// # Errors
    ///
    /// `NotFound` if no session has this id; the pointer is left unchanged.
    pub async fn switch_current_session(&self, id: &str) -> Result<()> {
        self.bridge
            .update(|snapshot| {
                if snapshot.position(id).is_none() {
                    return Err(StoreError::not_found(ENTITY_SESSION, id));
                }
                if snapshot.current_session_id.as_deref() == Some(id) {
                    return Ok(((), Vec::new()));
                }
                Ok(((), vec![ProjectionValue::CurrentSession(Some(id.to_string()))]))
            })
            .await?;

        tracing::debug!("Switched current session to {}", id);
        Ok(())
    }

    /// Duplicates `source` right after it in the list.
    ///
    /// The copy gets a fresh id and the name `"<name> (copy)"`. Its assistant
    /// avatar key, if any, points at the same blob as the source.
    ///
    /// # Errors
    ///
    /// `NotFound` if the source session no longer exists.
    pub async fn copy(&self, source: &Session) -> Result<Session> {
        let copy = self
            .bridge
            .update(|snapshot| {
                let index = snapshot
                    .position(&source.id)
                    .ok_or_else(|| StoreError::not_found(ENTITY_SESSION, &source.id))?;

                let copy = source.duplicate();
                let mut sessions = snapshot.sessions.clone();
                sessions.insert(index + 1, copy.clone());
                Ok((copy, vec![ProjectionValue::Sessions(sessions)]))
            })
            .await?;

        tracing::info!("Copied session {} to {}", source.id, copy.id);
        Ok(copy)
    }

    /// Merges a partial update into the session with `patch.id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no session has this id.
    pub async fn save(&self, patch: SessionPatch) -> Result<Session> {
        self.bridge
            .update(|snapshot| {
                let index = snapshot
                    .position(&patch.id)
                    .ok_or_else(|| StoreError::not_found(ENTITY_SESSION, &patch.id))?;

                let mut sessions = snapshot.sessions.clone();
                patch.apply_to(&mut sessions[index]);
                let saved = sessions[index].clone();
                Ok((saved, vec![ProjectionValue::Sessions(sessions)]))
            })
            .await
    }

    /// Deletes a session. Blob storage is never touched here; an avatar
    /// that is no longer referenced is reclaimed by the next cleanup.
    ///
    /// If the removed session was current, the last session in list order
    /// becomes current (none if the list is now empty).
    ///
    /// # Errors
    ///
    /// `NotFound` if no session has this id.
    pub async fn remove(&self, id: &str) -> Result<Session> {
        let removed = self
            .bridge
            .update(|snapshot| {
                let index = snapshot
                    .position(id)
                    .ok_or_else(|| StoreError::not_found(ENTITY_SESSION, id))?;

                let mut sessions = snapshot.sessions.clone();
                let removed = sessions.remove(index);

                let was_current = snapshot.current_session_id.as_deref() == Some(id);
                let next = sessions.last().map(|s| s.id.clone());

                let mut values = vec![ProjectionValue::Sessions(sessions)];
                if was_current {
                    values.push(ProjectionValue::CurrentSession(next));
                }
                Ok((removed, values))
            })
            .await?;

        tracing::info!("Removed session {}", id);
        Ok(removed)
    }

    /// Appends a new empty session and makes it current.
    pub async fn create(&self, session_type: SessionType, name: impl Into<String>) -> Result<Session> {
        let session = Session::new(session_type, name);
        self.bridge
            .update(|snapshot| {
                let mut sessions = snapshot.sessions.clone();
                sessions.push(session.clone());
                Ok((
                    (),
                    vec![
                        ProjectionValue::Sessions(sessions),
                        ProjectionValue::CurrentSession(Some(session.id.clone())),
                    ],
                ))
            })
            .await?;

        tracing::info!("Created {} session {}", session.session_type, session.id);
        Ok(session)
    }

    /// Appends a message to a session's conversation.
    pub async fn append_message(&self, id: &str, message: Message) -> Result<()> {
        self.bridge
            .update(|snapshot| {
                let index = snapshot
                    .position(id)
                    .ok_or_else(|| StoreError::not_found(ENTITY_SESSION, id))?;

                let mut sessions = snapshot.sessions.clone();
                sessions[index].messages.push(message);
                Ok(((), vec![ProjectionValue::Sessions(sessions)]))
            })
            .await
    }

    /// Flips the starred flag, returning the new value.
    pub async fn toggle_star(&self, id: &str) -> Result<bool> {
        self.bridge
            .update(|snapshot| {
                let index = snapshot
                    .position(id)
                    .ok_or_else(|| StoreError::not_found(ENTITY_SESSION, id))?;

                let mut sessions = snapshot.sessions.clone();
                let starred = !sessions[index].starred;
                SessionPatch::new(id).starred(starred).apply_to(&mut sessions[index]);
                Ok((starred, vec![ProjectionValue::Sessions(sessions)]))
            })
            .await
    }

    /// Shows or hides the session sidebar.
    ///
    /// Settings take the write-then-flush path: the UI reacts immediately
    /// and the value is persisted afterwards.
    pub async fn set_show_sidebar(&self, show: bool) -> Result<()> {
        let settings = self.bridge.settings().with_show_sidebar(show);
        self.bridge.write(ProjectionValue::Settings(settings));
        self.bridge.flush().await
    }
}
