//! Transcript export.
//!
//! Rendering is a pure function of the document: no clock, no I/O. A failed
//! or unfinished meeting exports whatever it has.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;
use uuid::Uuid;

use crate::agents::AgentProfile;
use crate::meeting::{MeetingConfig, MeetingStatus, Phase, TranscriptEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}' (expected markdown or json)")),
        }
    }
}

/// Borrowed view of everything an export contains.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptDocument<'a> {
    pub session_id: Uuid,
    pub config: &'a MeetingConfig,
    pub participants: &'a [AgentProfile],
    pub status: MeetingStatus,
    pub summary: Option<&'a str>,
    pub failure_reason: Option<&'a str>,
    pub entries: &'a [TranscriptEntry],
}

#[derive(Serialize)]
struct JsonExport<'a> {
    session_id: Uuid,
    topic: &'a str,
    rounds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    status: MeetingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<&'a str>,
    participants: Vec<JsonParticipant<'a>>,
    phases: Vec<JsonPhase<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonParticipant<'a> {
    id: &'a str,
    name: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
struct JsonPhase<'a> {
    phase: Phase,
    entries: Vec<&'a TranscriptEntry>,
}

impl<'a> TranscriptDocument<'a> {
    pub fn render(&self, format: ExportFormat) -> String {
        match format {
            ExportFormat::Markdown => self.to_markdown(),
            ExportFormat::Json => self.to_json(),
        }
    }

    /// Entries of `phase`, in sequence order.
    fn phase_entries(&self, phase: Phase) -> Vec<&'a TranscriptEntry> {
        let mut entries: Vec<&TranscriptEntry> =
            self.entries.iter().filter(|e| e.phase == phase).collect();
        entries.sort_by_key(|e| e.sequence);
        entries
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let participants = self
            .participants
            .iter()
            .map(AgentProfile::label)
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(out, "# Meeting: {}", self.config.topic);
        out.push('\n');
        let _ = writeln!(out, "- Session: {}", self.session_id);
        let _ = writeln!(out, "- Status: {}", self.status.as_str());
        let _ = writeln!(out, "- Rounds: {}", self.config.rounds);
        let _ = writeln!(out, "- Participants: {participants}");
        if let Some(scenario) = &self.config.scenario {
            let _ = writeln!(out, "- Scenario: {scenario}");
        }
        if let Some(language) = &self.config.language {
            let _ = writeln!(out, "- Language: {language}");
        }
        if let Some(reason) = self.failure_reason {
            let _ = writeln!(out, "- Ended early: {reason}");
        }

        for phase in Phase::ALL {
            let _ = write!(out, "\n## {}\n", phase.title());
            let entries = self.phase_entries(phase);
            if entries.is_empty() {
                out.push_str("\n_No entries._\n");
                continue;
            }

            let mut current_round = None;
            for entry in entries {
                if phase == Phase::Discussion && entry.round.is_some() && entry.round != current_round {
                    current_round = entry.round;
                    if let Some(round) = entry.round {
                        let _ = write!(out, "\n### Round {}\n", round + 1);
                    }
                }
                let _ = write!(
                    out,
                    "\n**{}** · {} · {}\n\n{}\n",
                    entry.speaker_label(),
                    entry.kind.as_str(),
                    entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                    entry.text.trim()
                );
            }
        }

        out
    }

    pub fn to_json(&self) -> String {
        let export = JsonExport {
            session_id: self.session_id,
            topic: &self.config.topic,
            rounds: self.config.rounds,
            scenario: self.config.scenario.as_deref(),
            language: self.config.language.as_deref(),
            status: self.status,
            failure_reason: self.failure_reason,
            participants: self
                .participants
                .iter()
                .map(|p| JsonParticipant {
                    id: &p.id,
                    name: &p.name,
                    title: &p.title,
                })
                .collect(),
            phases: Phase::ALL
                .into_iter()
                .map(|phase| JsonPhase {
                    phase,
                    entries: self.phase_entries(phase),
                })
                .collect(),
            summary: self.summary,
        };

        serde_json::to_string_pretty(&export).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::{EntryDraft, EntryKind, Transcript};

    fn fixture() -> (MeetingConfig, Vec<AgentProfile>, Transcript) {
        let config = MeetingConfig::new("Q3 launch plan", 1, ["a"]);
        let roster = vec![AgentProfile::new("a", "Alice", "Analyst")];
        let mut transcript = Transcript::new();
        for (phase, round, kind, text) in [
            (Phase::Introduction, None, EntryKind::Introduction, "Hi, I'm Alice."),
            (Phase::Discussion, Some(0), EntryKind::Contribution, "Launch in July."),
        ] {
            transcript.append(EntryDraft {
                speaker: "a".to_string(),
                speaker_name: "Alice".to_string(),
                speaker_title: "Analyst".to_string(),
                phase,
                round,
                kind,
                text: text.to_string(),
            });
        }
        (config, roster, transcript)
    }

    fn document<'a>(
        config: &'a MeetingConfig,
        roster: &'a [AgentProfile],
        transcript: &'a Transcript,
        status: MeetingStatus,
    ) -> TranscriptDocument<'a> {
        TranscriptDocument {
            session_id: Uuid::nil(),
            config,
            participants: roster,
            status,
            summary: None,
            failure_reason: None,
            entries: transcript.entries(),
        }
    }

    #[test]
    fn test_markdown_has_all_phases_in_order() {
        let (config, roster, transcript) = fixture();
        let md = document(&config, &roster, &transcript, MeetingStatus::Active).to_markdown();

        let intro = md.find("## Introduction").unwrap();
        let discussion = md.find("## Discussion").unwrap();
        let conclusion = md.find("## Conclusion").unwrap();
        assert!(intro < discussion && discussion < conclusion);
        assert!(md.contains("### Round 1"));
        assert!(md.contains("**Alice (Analyst)** · introduction · "));
        assert!(md.contains("_No entries._"));
        assert!(md.contains("- Participants: Alice (Analyst)"));
    }

    #[test]
    fn test_export_is_byte_identical_on_repeat() {
        let (config, roster, transcript) = fixture();
        let doc = document(&config, &roster, &transcript, MeetingStatus::Completed);
        assert_eq!(doc.render(ExportFormat::Markdown), doc.render(ExportFormat::Markdown));
        assert_eq!(doc.render(ExportFormat::Json), doc.render(ExportFormat::Json));
    }

    #[test]
    fn test_failed_session_exports_reason() {
        let (config, roster, transcript) = fixture();
        let mut doc = document(&config, &roster, &transcript, MeetingStatus::Failed);
        doc.failure_reason = Some("stopped by initiator");
        let md = doc.to_markdown();
        assert!(md.contains("- Status: failed"));
        assert!(md.contains("- Ended early: stopped by initiator"));
    }

    #[test]
    fn test_json_groups_entries_by_phase() {
        let (config, roster, transcript) = fixture();
        let json = document(&config, &roster, &transcript, MeetingStatus::Active).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["topic"], "Q3 launch plan");
        assert_eq!(value["status"], "active");
        let phases = value["phases"].as_array().unwrap();
        assert_eq!(phases.len(), 3);
        assert_eq!(phases[0]["phase"], "introduction");
        assert_eq!(phases[1]["entries"][0]["text"], "Launch in July.");
        assert!(phases[2]["entries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_empty_transcript_still_renders() {
        let config = MeetingConfig::new("t", 1, ["a"]);
        let transcript = Transcript::new();
        let md = document(&config, &[], &transcript, MeetingStatus::Failed).to_markdown();
        assert_eq!(md.matches("_No entries._").count(), 3);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
