//! Phase, status and turn types shared by the state machine, sessions and events.

use serde::{Deserialize, Serialize};

/// Agenda phase. Ordered; a meeting never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Introduction,
    Discussion,
    Conclusion,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Introduction => "introduction",
            Self::Discussion => "discussion",
            Self::Conclusion => "conclusion",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Introduction => "Introduction",
            Self::Discussion => "Discussion",
            Self::Conclusion => "Conclusion",
        }
    }

    pub const ALL: [Phase; 3] = [Phase::Introduction, Phase::Discussion, Phase::Conclusion];
}

/// Externally visible lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Position of the meeting in its agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Created,
    Introduction { speaker: usize },
    Discussion { round: u32, speaker: usize },
    Conclusion,
    Completed,
    Failed { reason: String },
}

impl Stage {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Introduction { .. } => Some(Phase::Introduction),
            Self::Discussion { .. } => Some(Phase::Discussion),
            Self::Conclusion => Some(Phase::Conclusion),
            Self::Created | Self::Completed | Self::Failed { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Created => "created".to_string(),
            Self::Introduction { speaker } => format!("introduction (speaker {speaker})"),
            Self::Discussion { round, speaker } => {
                format!("discussion (round {round}, speaker {speaker})")
            }
            Self::Conclusion => "conclusion".to_string(),
            Self::Completed => "completed".to_string(),
            Self::Failed { reason } => format!("failed ({reason})"),
        }
    }
}

/// One unit of generation work: the thing `advance` is told has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    Introduce { speaker: usize },
    Discuss { round: u32, speaker: usize },
    Summarize,
}

impl Turn {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Introduce { .. } => Phase::Introduction,
            Self::Discuss { .. } => Phase::Discussion,
            Self::Summarize => Phase::Conclusion,
        }
    }

    /// Roster index of the speaker; `None` for the moderator's summary.
    pub fn speaker(&self) -> Option<usize> {
        match self {
            Self::Introduce { speaker } | Self::Discuss { speaker, .. } => Some(*speaker),
            Self::Summarize => None,
        }
    }

    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Discuss { round, .. } => Some(*round),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_and_serialization() {
        assert!(Phase::Introduction < Phase::Discussion);
        assert!(Phase::Discussion < Phase::Conclusion);
        assert_eq!(serde_json::to_string(&Phase::Discussion).unwrap(), "\"discussion\"");
        let parsed: Phase = serde_json::from_str("\"conclusion\"").unwrap();
        assert_eq!(parsed, Phase::Conclusion);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!MeetingStatus::Active.is_terminal());
        assert!(!MeetingStatus::Paused.is_terminal());
        assert!(MeetingStatus::Completed.is_terminal());
        assert!(MeetingStatus::Failed.is_terminal());
        assert_eq!(MeetingStatus::Paused.as_str(), "paused");
    }

    #[test]
    fn test_turn_accessors() {
        let turn = Turn::Discuss { round: 1, speaker: 2 };
        assert_eq!(turn.phase(), Phase::Discussion);
        assert_eq!(turn.speaker(), Some(2));
        assert_eq!(turn.round(), Some(1));
        assert_eq!(Turn::Summarize.speaker(), None);
        assert_eq!(Turn::Introduce { speaker: 0 }.round(), None);
    }
}
