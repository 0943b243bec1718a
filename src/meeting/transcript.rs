//! Append-only meeting transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Moderator's welcome at the start of introductions.
    Opening,
    Introduction,
    /// Moderator's statement of a discussion round's focus.
    Framing,
    Contribution,
    Summary,
    /// Stands in for a turn whose generation failed on every attempt.
    Placeholder,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Introduction => "introduction",
            Self::Framing => "framing",
            Self::Contribution => "contribution",
            Self::Summary => "summary",
            Self::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sequence: u64,
    /// Profile id, or `moderator`.
    pub speaker: String,
    pub speaker_name: String,
    pub speaker_title: String,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub kind: EntryKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn speaker_label(&self) -> String {
        format!("{} ({})", self.speaker_name, self.speaker_title)
    }
}

/// Everything about an entry except what the transcript assigns on append.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub speaker: String,
    pub speaker_name: String,
    pub speaker_title: String,
    pub phase: Phase,
    pub round: Option<u32>,
    pub kind: EntryKind,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry; sequence numbers start at 1.
    pub fn append(&mut self, draft: EntryDraft) -> &TranscriptEntry {
        let sequence = self.entries.last().map(|e| e.sequence + 1).unwrap_or(1);
        self.entries.push(TranscriptEntry {
            sequence,
            speaker: draft.speaker,
            speaker_name: draft.speaker_name,
            speaker_title: draft.speaker_title,
            phase: draft.phase,
            round: draft.round,
            kind: draft.kind,
            text: draft.text,
            timestamp: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn page(&self, offset: usize, limit: usize) -> &[TranscriptEntry] {
        let start = offset.min(self.entries.len());
        let end = start.saturating_add(limit).min(self.entries.len());
        &self.entries[start..end]
    }
}
