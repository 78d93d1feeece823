//! Play-mode control

use tracing::info;

use super::error::OrchestrationError;
use crate::engine::EngineHost;
use crate::response::PlayControlOutcome;

const VALID_ACTIONS: &str = "play, stop, pause, resume, step, status";

/// A play-mode control action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    Play,
    Stop,
    Pause,
    Resume,
    Step,
    Status,
}

impl PlayAction {
    /// Parse an action name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "play" => Some(Self::Play),
            "stop" => Some(Self::Stop),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "step" => Some(Self::Step),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    /// Parse a tool argument, rejecting missing or unknown actions
    pub fn from_argument(value: Option<&str>) -> Result<Self, OrchestrationError> {
        match value {
            None => Err(OrchestrationError::invalid_request(format!(
                "action is required. Valid values: {}.",
                VALID_ACTIONS
            ))),
            Some(raw) => Self::parse(raw).ok_or_else(|| {
                OrchestrationError::invalid_request(format!(
                    "Invalid action: '{}'. Valid values: {}.",
                    raw, VALID_ACTIONS
                ))
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Step => "step",
            Self::Status => "status",
        }
    }
}

/// Drives the editor's play mode
#[derive(Clone)]
pub struct PlayControl {
    host: EngineHost,
}

impl PlayControl {
    pub fn new(host: EngineHost) -> Self {
        Self { host }
    }

    /// Apply `action` and report the resulting play state
    pub async fn control(&self, action: PlayAction) -> Result<PlayControlOutcome, OrchestrationError> {
        let engine = self
            .host
            .monitor()
            .current()
            .handle()
            .ok_or(OrchestrationError::NotConnected)?;

        let state = self
            .host
            .dispatcher()
            .call_on_owner(move || {
                match action {
                    PlayAction::Play => engine.set_playing(true)?,
                    PlayAction::Stop => engine.set_playing(false)?,
                    PlayAction::Pause => engine.set_paused(true)?,
                    PlayAction::Resume => engine.set_paused(false)?,
                    PlayAction::Step => engine.step_frame()?,
                    PlayAction::Status => {}
                }
                Ok(engine.play_state())
            })
            .await?;

        info!(
            action = action.as_str(),
            is_playing = state.is_playing,
            is_paused = state.is_paused,
            "Play control applied"
        );

        Ok(PlayControlOutcome {
            action: action.as_str(),
            is_playing: state.is_playing,
            is_paused: state.is_paused,
        })
    }
}
