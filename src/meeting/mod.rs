//! Meeting engine.
//!
//! A meeting moves through introductions, discussion rounds and a moderator
//! summary. Each session owns its state machine, transcript and event stream
//! and is driven by one runner task; the registry only maps ids to sessions.

pub mod error;
pub mod moderator;
pub mod registry;
pub mod runner;
pub mod session;
pub mod settings;
pub mod setup;
pub mod state_machine;
pub mod status;
pub mod transcript;

pub use error::{MeetingError, MeetingResult};
pub use moderator::Moderator;
pub use registry::{MeetingRegistry, StartedMeeting};
pub use session::{
    ControlAck, ControlCommand, MeetingSession, SessionHandle, SessionSnapshot, SessionSummary,
    STOP_REASON,
};
pub use settings::EngineSettings;
pub use setup::MeetingConfig;
pub use state_machine::{MeetingState, Transition};
pub use status::{MeetingStatus, Phase, Stage, Turn};
pub use transcript::{EntryDraft, EntryKind, Transcript, TranscriptEntry};
