//! Per-session event stream.
//!
//! Each session owns one [`EventBroadcaster`]. Events get their sequence
//! numbers while the session lock is held, so a snapshot taken under the same
//! lock together with a receiver created there covers every event exactly
//! once: everything up to `last_sequence` is in the snapshot, everything after
//! arrives on the receiver. Sending never waits for observers; a slow observer
//! lags and has to resynchronise from a fresh snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::meeting::{MeetingConfig, Phase, TranscriptEntry};

/// Buffered events per session before a slow observer starts lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingEvent {
    pub session_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted {
        config: MeetingConfig,
    },
    PhaseChanged {
        phase: Phase,
    },
    TurnStarted {
        /// Profile id, or `moderator` for the summary.
        speaker: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round: Option<u32>,
    },
    EntryAppended {
        entry: TranscriptEntry,
    },
    SessionCompleted {
        summary: String,
    },
    SessionFailed {
        reason: String,
    },
    SessionPaused,
    SessionResumed,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::TurnStarted { .. } => "turn_started",
            Self::EntryAppended { .. } => "entry_appended",
            Self::SessionCompleted { .. } => "session_completed",
            Self::SessionFailed { .. } => "session_failed",
            Self::SessionPaused => "session_paused",
            Self::SessionResumed => "session_resumed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionCompleted { .. } | Self::SessionFailed { .. }
        )
    }
}

pub struct EventBroadcaster {
    session_id: Uuid,
    last_sequence: u64,
    sender: broadcast::Sender<MeetingEvent>,
}

impl EventBroadcaster {
    pub fn new(session_id: Uuid, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            session_id,
            last_sequence: 0,
            sender,
        }
    }

    /// Stamp and fan out an event. Having no observers is not an error.
    pub fn publish(&mut self, kind: EventKind) -> MeetingEvent {
        self.last_sequence += 1;
        let event = MeetingEvent {
            session_id: self.session_id,
            sequence: self.last_sequence,
            timestamp: Utc::now(),
            kind,
        };

        match self.sender.send(event.clone()) {
            Ok(observers) => trace!(
                "Session {} event #{} {} sent to {} observer(s)",
                self.session_id,
                event.sequence,
                event.kind.name(),
                observers
            ),
            Err(_) => debug!(
                "Session {} event #{} {} has no observers",
                self.session_id,
                event.sequence,
                event.kind.name()
            ),
        }

        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeetingEvent> {
        self.sender.subscribe()
    }

    /// Sequence number of the most recent event, 0 before the first one.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_assigns_sequence_and_delivers() {
        let id = Uuid::new_v4();
        let mut broadcaster = EventBroadcaster::new(id, 16);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(EventKind::PhaseChanged {
            phase: Phase::Introduction,
        });
        broadcaster.publish(EventKind::SessionPaused);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.session_id, id);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.kind, EventKind::SessionPaused);
        assert_eq!(broadcaster.last_sequence(), 2);
    }

    #[test]
    fn test_publish_without_observers_does_not_fail() {
        let mut broadcaster = EventBroadcaster::new(Uuid::new_v4(), 4);
        assert_eq!(broadcaster.observer_count(), 0);
        let event = broadcaster.publish(EventKind::SessionResumed);
        assert_eq!(event.sequence, 1);
    }

    #[test]
    fn test_late_subscriber_only_sees_later_events() {
        let mut broadcaster = EventBroadcaster::new(Uuid::new_v4(), 16);
        broadcaster.publish(EventKind::SessionPaused);
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(EventKind::SessionResumed);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.sequence, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_observer_lags_instead_of_blocking() {
        let mut broadcaster = EventBroadcaster::new(Uuid::new_v4(), 2);
        let mut rx = broadcaster.subscribe();
        for _ in 0..5 {
            broadcaster.publish(EventKind::SessionPaused);
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_event_wire_format() {
        let event = MeetingEvent {
            session_id: Uuid::nil(),
            sequence: 7,
            timestamp: Utc::now(),
            kind: EventKind::TurnStarted {
                speaker: "marketing".to_string(),
                round: Some(1),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "turn_started");
        assert_eq!(json["speaker"], "marketing");
        assert_eq!(json["round"], 1);
        assert_eq!(json["sequence"], 7);

        let back: MeetingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);

        let paused = serde_json::to_value(EventKind::SessionPaused).unwrap();
        assert_eq!(paused["type"], "session_paused");
    }
}
