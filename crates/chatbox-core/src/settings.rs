//! Application settings domain model.
//!
//! Contains the singleton record of UI/global preferences that persists
//! across restarts alongside the session records.

use serde::{Deserialize, Serialize};

/// Color theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// UI/global preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Whether the session sidebar is visible.
    #[serde(default = "default_show_sidebar")]
    pub show_sidebar: bool,

    /// UI language tag (e.g. "en", "zh-Hans"); `None` follows the system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub theme: Theme,
}

fn default_show_sidebar() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            show_sidebar: default_show_sidebar(),
            language: None,
            theme: Theme::default(),
        }
    }
}

impl AppSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the sidebar visibility changed.
    pub fn with_show_sidebar(mut self, show: bool) -> Self {
        self.show_sidebar = show;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let settings = AppSettings::new();
        assert!(settings.show_sidebar);
        assert!(settings.language.is_none());
        assert_eq!(settings.theme, Theme::System);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_camel_case_round_trip() {
        let settings = AppSettings::new().with_show_sidebar(false);
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["showSidebar"], false);
    }
}
