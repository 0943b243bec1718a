//! Engine-wide settings shared read-only by every session.

use std::time::Duration;

use crate::config::{Config, IdleAction, ModeratorConfig, ScenarioConfig};
use crate::events;
use crate::prompt::PromptComposer;

use super::moderator::Moderator;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_rounds: u32,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub generation_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub idle_action: IdleAction,
    pub retention: Duration,
    pub turn_delay: Duration,
    pub event_capacity: usize,
    pub default_language: Option<String>,
    pub announce_opening: bool,
    pub round_focus: Vec<String>,
    pub round_focus_fallback: String,
    pub moderator: ModeratorConfig,
    pub scenarios: Vec<ScenarioConfig>,
    pub composer: PromptComposer,
}

impl EngineSettings {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn moderator_for(&self, scenario: Option<&ScenarioConfig>) -> Moderator {
        Moderator::new(
            &self.moderator,
            self.round_focus.clone(),
            self.round_focus_fallback.clone(),
            self.announce_opening,
        )
        .for_scenario(scenario)
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        let meeting = &config.meeting;
        Self {
            max_rounds: meeting.max_rounds,
            max_attempts: meeting.max_attempts.max(1),
            retry_backoff: Duration::from_millis(meeting.retry_backoff_ms),
            generation_timeout: Duration::from_secs(meeting.generation_timeout_secs.max(1)),
            idle_timeout: meeting
                .idle_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            idle_action: meeting.idle_action,
            retention: Duration::from_secs(meeting.retention_secs),
            turn_delay: Duration::from_millis(meeting.turn_delay_ms),
            event_capacity: events::DEFAULT_CAPACITY,
            default_language: meeting.language.clone(),
            announce_opening: meeting.announce_opening,
            round_focus: meeting.round_focus.clone(),
            round_focus_fallback: meeting.round_focus_fallback.clone(),
            moderator: config.moderator.clone(),
            scenarios: config.scenarios.clone(),
            composer: PromptComposer::new(
                meeting.context_entries,
                meeting.context_chars,
                meeting.summary_entries,
            ),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default_with_cast())
    }
}
