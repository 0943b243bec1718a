//! Meeting configuration submitted by an initiator, and its validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::{MeetingError, MeetingResult};
use crate::agents::{AgentProfile, AgentProfileStore, MODERATOR_ID};

fn default_rounds() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingConfig {
    pub topic: String,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Speaking roster in turn order. The moderator is implicit.
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Language the participants should answer in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MeetingConfig {
    pub fn new<I, S>(topic: impl Into<String>, rounds: u32, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            rounds,
            participants: participants.into_iter().map(Into::into).collect(),
            scenario: None,
            language: None,
        }
    }

    /// Check the config and resolve the roster to profiles, in order.
    pub fn validate(
        &self,
        profiles: &AgentProfileStore,
        max_rounds: u32,
        known_scenarios: &[&str],
    ) -> MeetingResult<Vec<AgentProfile>> {
        if self.topic.trim().is_empty() {
            return Err(MeetingError::InvalidConfig(
                "topic must not be empty".to_string(),
            ));
        }
        if self.rounds == 0 {
            return Err(MeetingError::InvalidConfig(
                "rounds must be at least 1".to_string(),
            ));
        }
        if self.rounds > max_rounds {
            return Err(MeetingError::InvalidConfig(format!(
                "rounds must be at most {max_rounds}"
            )));
        }
        if self.participants.is_empty() {
            return Err(MeetingError::InvalidConfig(
                "at least one participant is required".to_string(),
            ));
        }
        if let Some(scenario) = &self.scenario {
            if !known_scenarios.contains(&scenario.as_str()) {
                return Err(MeetingError::InvalidConfig(format!(
                    "unknown scenario '{scenario}'"
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut roster = Vec::with_capacity(self.participants.len());
        for id in &self.participants {
            if id == MODERATOR_ID {
                return Err(MeetingError::InvalidConfig(
                    "the moderator is always present and cannot be in the speaking roster"
                        .to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(MeetingError::InvalidConfig(format!(
                    "participant '{id}' is listed more than once"
                )));
            }
            let profile = profiles
                .get(id)
                .ok_or_else(|| MeetingError::InvalidConfig(format!("unknown participant '{id}'")))?;
            roster.push(profile.clone());
        }

        Ok(roster)
    }
}
