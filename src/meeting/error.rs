//! Error kinds surfaced by the meeting engine.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeetingError {
    /// Malformed meeting setup, rejected before any session state exists.
    #[error("Invalid meeting config: {0}")]
    InvalidConfig(String),

    /// Command not allowed in the current state; nothing changed.
    #[error("Cannot {command} while {state}")]
    InvalidTransition { command: String, state: String },

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Meeting session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Observer channel error: {0}")]
    ObserverChannel(String),

    /// Control command presented without the session's control token.
    #[error("Control commands for this meeting are reserved for its initiator")]
    NotInitiator,

    /// Broken engine invariant; the session is forced to `failed`.
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

impl MeetingError {
    pub fn invalid_transition(command: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidTransition {
            command: command.into(),
            state: state.into(),
        }
    }
}

pub type MeetingResult<T> = Result<T, MeetingError>;
