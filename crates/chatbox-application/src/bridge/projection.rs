//! In-memory projections of the persisted store.

use chatbox_core::AppSettings;
use chatbox_core::session::Session;

/// Names one piece of observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// The ordered session list.
    Sessions,
    /// The id of the session shown in the main view.
    CurrentSession,
    /// The settings singleton.
    Settings,
}

impl Projection {
    pub const ALL: [Projection; 3] = [
        Projection::Sessions,
        Projection::CurrentSession,
        Projection::Settings,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Projection::Sessions => "sessions",
            Projection::CurrentSession => "current-session",
            Projection::Settings => "settings",
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The value held by a [`Projection`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionValue {
    Sessions(Vec<Session>),
    CurrentSession(Option<String>),
    Settings(AppSettings),
}

impl ProjectionValue {
    pub fn projection(&self) -> Projection {
        match self {
            ProjectionValue::Sessions(_) => Projection::Sessions,
            ProjectionValue::CurrentSession(_) => Projection::CurrentSession,
            ProjectionValue::Settings(_) => Projection::Settings,
        }
    }

    pub fn as_sessions(&self) -> Option<&[Session]> {
        match self {
            ProjectionValue::Sessions(sessions) => Some(sessions),
            _ => None,
        }
    }

    pub fn as_current_session(&self) -> Option<Option<&str>> {
        match self {
            ProjectionValue::CurrentSession(id) => Some(id.as_deref()),
            _ => None,
        }
    }

    pub fn as_settings(&self) -> Option<&AppSettings> {
        match self {
            ProjectionValue::Settings(settings) => Some(settings),
            _ => None,
        }
    }
}

/// A consistent copy of every projection, taken under one lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeSnapshot {
    pub sessions: Vec<Session>,
    pub current_session_id: Option<String>,
    pub settings: AppSettings,
}

impl BridgeSnapshot {
    /// Returns the list index of a session.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get(&self, projection: Projection) -> ProjectionValue {
        match projection {
            Projection::Sessions => ProjectionValue::Sessions(self.sessions.clone()),
            Projection::CurrentSession => {
                ProjectionValue::CurrentSession(self.current_session_id.clone())
            }
            Projection::Settings => ProjectionValue::Settings(self.settings.clone()),
        }
    }

    /// Replaces one projection; returns false if the value was structurally
    /// equal to what was already there.
    pub(crate) fn replace(&mut self, value: ProjectionValue) -> bool {
        match value {
            ProjectionValue::Sessions(sessions) => {
                if self.sessions == sessions {
                    return false;
                }
                self.sessions = sessions;
            }
            ProjectionValue::CurrentSession(id) => {
                if self.current_session_id == id {
                    return false;
                }
                self.current_session_id = id;
            }
            ProjectionValue::Settings(settings) => {
                if self.settings == settings {
                    return false;
                }
                self.settings = settings;
            }
        }
        true
    }
}
