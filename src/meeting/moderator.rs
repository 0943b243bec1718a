//! The moderator pseudo-agent.
//!
//! Always present and never part of the speaking roster. Its opening and
//! framing statements are rendered from configured templates; only the closing
//! summary is generated.

use crate::agents::{AgentProfile, MODERATOR_ID};
use crate::config::{ModeratorConfig, ScenarioConfig};

use super::status::Phase;
use super::transcript::{EntryDraft, EntryKind};

#[derive(Debug, Clone)]
pub struct Moderator {
    name: String,
    title: String,
    opening_template: String,
    framing_template: String,
    round_focus: Vec<String>,
    round_focus_fallback: String,
    announce_opening: bool,
}

impl Moderator {
    pub fn new(
        config: &ModeratorConfig,
        round_focus: Vec<String>,
        round_focus_fallback: String,
        announce_opening: bool,
    ) -> Self {
        Self {
            name: config.name.clone(),
            title: config.title.clone(),
            opening_template: config.opening_template.clone(),
            framing_template: config.framing_template.clone(),
            round_focus,
            round_focus_fallback,
            announce_opening,
        }
    }

    /// Use a scenario's round structure instead of the default one, if it has any.
    pub fn for_scenario(mut self, scenario: Option<&ScenarioConfig>) -> Self {
        if let Some(scenario) = scenario {
            if !scenario.round_focus.is_empty() {
                self.round_focus = scenario.round_focus.clone();
            }
        }
        self
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile::new(MODERATOR_ID, self.name.clone(), self.title.clone())
            .with_personality(["neutral", "organised"])
            .with_speaking_style("Concise, structured, lists conclusions and next steps.")
    }

    pub fn announces_opening(&self) -> bool {
        self.announce_opening
    }

    pub fn opening_statement(&self, topic: &str, roster: &[AgentProfile]) -> String {
        let participants = roster
            .iter()
            .map(AgentProfile::label)
            .collect::<Vec<_>>()
            .join(", ");

        self.opening_template
            .replace("{name}", &self.name)
            .replace("{title}", &self.title)
            .replace("{topic}", topic)
            .replace("{participants}", &participants)
    }

    /// Focus of a 0-based round. Rendered round numbers are 1-based.
    pub fn round_focus(&self, round: u32, topic: &str) -> String {
        let template = self
            .round_focus
            .get(round as usize)
            .unwrap_or(&self.round_focus_fallback);
        fill_round(template, round, topic)
    }

    pub fn framing_statement(&self, round: u32, topic: &str) -> String {
        let focus = self.round_focus(round, topic);
        fill_round(&self.framing_template, round, topic).replace("{focus}", &focus)
    }

    pub fn opening_draft(&self, topic: &str, roster: &[AgentProfile]) -> EntryDraft {
        self.draft(
            Phase::Introduction,
            None,
            EntryKind::Opening,
            self.opening_statement(topic, roster),
        )
    }

    pub fn framing_draft(&self, round: u32, topic: &str) -> EntryDraft {
        self.draft(
            Phase::Discussion,
            Some(round),
            EntryKind::Framing,
            self.framing_statement(round, topic),
        )
    }

    pub fn summary_draft(&self, text: String, kind: EntryKind) -> EntryDraft {
        self.draft(Phase::Conclusion, None, kind, text)
    }

    fn draft(&self, phase: Phase, round: Option<u32>, kind: EntryKind, text: String) -> EntryDraft {
        EntryDraft {
            speaker: MODERATOR_ID.to_string(),
            speaker_name: self.name.clone(),
            speaker_title: self.title.clone(),
            phase,
            round,
            kind,
            text,
        }
    }
}

fn fill_round(template: &str, round: u32, topic: &str) -> String {
    template
        .replace("{round}", &(round + 1).to_string())
        .replace("{topic}", topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeetingSettings;

    fn moderator() -> Moderator {
        let settings = MeetingSettings::default();
        Moderator::new(
            &ModeratorConfig::default(),
            settings.round_focus,
            settings.round_focus_fallback,
            true,
        )
    }

    #[test]
    fn test_opening_names_topic_and_participants() {
        let roster = vec![
            AgentProfile::new("a", "Alice", "Analyst"),
            AgentProfile::new("b", "Bob", "Builder"),
        ];
        let text = moderator().opening_statement("Q3 launch plan", &roster);
        assert!(text.contains("Q3 launch plan"));
        assert!(text.contains("Alice (Analyst), Bob (Builder)"));
        assert!(text.contains("Morgan"));
    }

    #[test]
    fn test_round_focus_is_deterministic_with_fallback() {
        let m = moderator();
        let first = m.round_focus(0, "pricing");
        assert!(first.starts_with("Divergent ideation"));
        assert!(first.contains("pricing"));
        assert!(m.round_focus(1, "pricing").starts_with("Convergence"));
        assert_eq!(m.round_focus(7, "pricing"), "Further discussion of pricing (round 8)");
        assert_eq!(m.round_focus(0, "pricing"), first);
    }

    #[test]
    fn test_framing_statement_uses_one_based_round() {
        let text = moderator().framing_statement(1, "pricing");
        assert!(text.starts_with("Round 2: Convergence"));
    }

    #[test]
    fn test_scenario_overrides_round_focus() {
        let scenario = ScenarioConfig {
            name: "retro".to_string(),
            description: String::new(),
            guidance: String::new(),
            round_focus: vec!["What went well with {topic}".to_string()],
        };
        let m = moderator().for_scenario(Some(&scenario));
        assert_eq!(m.round_focus(0, "launch"), "What went well with launch");
        assert!(m.round_focus(1, "launch").starts_with("Further discussion"));
    }

    #[test]
    fn test_drafts_carry_moderator_identity() {
        let draft = moderator().framing_draft(0, "x");
        assert_eq!(draft.speaker, MODERATOR_ID);
        assert_eq!(draft.kind, EntryKind::Framing);
        assert_eq!(draft.round, Some(0));
        assert_eq!(draft.phase, Phase::Discussion);
        assert_eq!(moderator().profile().id, MODERATOR_ID);
    }
}
