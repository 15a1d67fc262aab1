//! Backend payloads and the editor state the controller observes.

use serde::{Deserialize, Serialize};

use crate::domain::range::{Range, Selection};

/// Payload of the `spans` subcommand: every analyzable body in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spans {
    pub spans: Vec<Range>,
}

/// One tracked place together with the ranges its slice covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub range: Range,
    pub slice: Vec<Range>,
    #[serde(default)]
    pub mutations: Vec<Range>,
}

/// Payload of the `focus` subcommand for one body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusOutput {
    pub place_info: Vec<PlaceInfo>,
    pub body_range: Range,
    #[serde(default)]
    pub arg_range: Option<Range>,
}

/// Focus mode state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Idle,
    Active,
    Unsaved,
    Loading,
    Error,
}

/// Status indicator for a [`FocusMode`]: an icon name and the command a click runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    pub icon: Option<&'static str>,
    pub command: &'static str,
}

impl FocusMode {
    pub fn indicator(self) -> StatusIndicator {
        let (icon, command) = match self {
            Self::Idle => (None, "focus"),
            Self::Active => (Some("check"), "focus"),
            Self::Unsaved => (Some("circle-slash"), "focus"),
            Self::Loading => (Some("sync~spin"), "focus"),
            Self::Error => (Some("x"), "last_error"),
        };
        StatusIndicator { icon, command }
    }

    /// Whether focus mode is switched on, whatever its current sub-state.
    pub fn is_on(self) -> bool {
        self != Self::Idle
    }
}

/// Snapshot of the active editor as seen by the focus controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub filename: String,
    pub selection: Selection,
}

impl EditorSnapshot {
    pub fn new(filename: impl Into<String>, selection: Selection) -> Self {
        Self {
            filename: filename.into(),
            selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_output_tolerates_missing_optional_fields() {
        let payload = r#"{
            "place_info": [
                {"range": {"start": 40, "end": 50, "filename": "a.rs"},
                 "slice": [{"start": 10, "end": 20, "filename": "a.rs"}]}
            ],
            "body_range": {"start": 0, "end": 100, "filename": "a.rs"}
        }"#;
        let focus: FocusOutput = serde_json::from_str(payload).unwrap();
        assert!(focus.arg_range.is_none());
        assert!(focus.place_info[0].mutations.is_empty());
        assert_eq!(focus.body_range.end, 100);
    }

    #[test]
    fn error_indicator_points_at_last_error() {
        assert_eq!(FocusMode::Error.indicator().command, "last_error");
        assert_eq!(FocusMode::Idle.indicator().icon, None);
        assert!(FocusMode::Unsaved.is_on());
        assert!(!FocusMode::Idle.is_on());
    }
}
