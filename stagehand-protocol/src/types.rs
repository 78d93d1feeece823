//! Enumerations shared by the wire records

use serde::{Deserialize, Serialize};

/// Test platform a launch runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMode {
    /// Tests executed inside the editor without entering play mode
    EditMode,
    /// Tests executed in play mode
    PlayMode,
}

impl TestMode {
    /// Parse a caller-supplied mode string
    ///
    /// Accepts `EditMode`, `edit`, `PlayMode` and `play`, ignoring case and
    /// surrounding whitespace. Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "editmode" | "edit" => Some(Self::EditMode),
            "playmode" | "play" => Some(Self::PlayMode),
            _ => None,
        }
    }

    /// Canonical name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EditMode => "EditMode",
            Self::PlayMode => "PlayMode",
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single test as reported by the engine
///
/// The engine may grow new statuses; anything this version does not know
/// deserializes to [`EngineTestStatus::Unknown`]. Consumers outside this crate
/// must keep a fallback arm when matching.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineTestStatus {
    Pending,
    Running,
    Success,
    Failure,
    Ignored,
    Inconclusive,
    #[serde(other)]
    Unknown,
}

impl EngineTestStatus {
    /// Whether the test has finished (anything other than Pending/Running)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Terminal status retained for a test result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestResultStatus {
    Success,
    Failure,
    Ignored,
    Inconclusive,
}

/// Kind of asset refresh requested before a compilation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefreshKind {
    /// Import changed assets only
    #[default]
    Normal,
    /// Reimport everything
    Force,
}

/// Severity of an editor console log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEventKind {
    Error,
    Warning,
    Message,
}

impl LogEventKind {
    /// Name used in collected log entries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Message => "Message",
        }
    }
}

/// Play-mode state of the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayState {
    pub is_playing: bool,
    pub is_paused: bool,
}
