//! Participant profiles.
//!
//! Profiles are loaded once from configuration and shared read-only by every
//! session through an `Arc<AgentProfileStore>`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Identifier reserved for the moderator pseudo-agent.
pub const MODERATOR_ID: &str = "moderator";

/// A configured meeting participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    /// Role title, e.g. "Marketing Manager".
    pub title: String,
    #[serde(default)]
    pub personality: Vec<String>,
    #[serde(default)]
    pub expertise: BTreeSet<String>,
    #[serde(default)]
    pub speaking_style: String,
    /// Sampling temperature hint for this agent's generations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: title.into(),
            personality: Vec::new(),
            expertise: BTreeSet::new(),
            speaking_style: String::new(),
            temperature: None,
        }
    }

    pub fn with_personality<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.personality = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expertise<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_speaking_style(mut self, style: impl Into<String>) -> Self {
        self.speaking_style = style.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// "Name (Title)" label used in transcripts and exports.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.title)
    }
}

/// Read-only lookup of profiles by id, preserving configuration order.
#[derive(Debug, Clone, Default)]
pub struct AgentProfileStore {
    profiles: Vec<AgentProfile>,
    index: HashMap<String, usize>,
}

impl AgentProfileStore {
    /// Build a store. Later duplicates of an id and profiles using the
    /// reserved moderator id are skipped.
    pub fn new(profiles: Vec<AgentProfile>) -> Self {
        let mut store = Self::default();
        for profile in profiles {
            if profile.id == MODERATOR_ID {
                warn!("Ignoring agent profile using reserved id '{}'", MODERATOR_ID);
                continue;
            }
            if store.index.contains_key(&profile.id) {
                warn!("Ignoring duplicate agent profile '{}'", profile.id);
                continue;
            }
            store.index.insert(profile.id.clone(), store.profiles.len());
            store.profiles.push(profile);
        }
        store
    }

    pub fn get(&self, id: &str) -> Option<&AgentProfile> {
        self.index.get(id).map(|&i| &self.profiles[i])
    }

    pub fn all(&self) -> &[AgentProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// The stock cast shipped in the default configuration.
pub fn default_profiles() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("gm", "Grace", "General Manager")
            .with_personality(["decisive", "big-picture", "calm under pressure"])
            .with_expertise(["strategy", "leadership", "prioritisation"])
            .with_speaking_style("Brief and directive; closes points with a clear next step.")
            .with_temperature(0.6),
        AgentProfile::new("bm", "Ben", "Business Manager")
            .with_personality(["pragmatic", "customer-focused"])
            .with_expertise(["partnerships", "sales", "operations"])
            .with_speaking_style("Grounds ideas in concrete customer examples."),
        AgentProfile::new("marketing", "Mia", "Marketing Manager")
            .with_personality(["enthusiastic", "creative", "trend-aware"])
            .with_expertise(["branding", "campaigns", "market research"])
            .with_speaking_style("Energetic, builds on other people's ideas.")
            .with_temperature(0.9),
        AgentProfile::new("finance", "Frank", "Financial Manager")
            .with_personality(["cautious", "analytical"])
            .with_expertise(["budgeting", "forecasting", "risk"])
            .with_speaking_style("Numbers first; asks what things will cost.")
            .with_temperature(0.4),
        AgentProfile::new("rnd", "Rita", "R&D Director")
            .with_personality(["curious", "rigorous", "inventive"])
            .with_expertise(["engineering", "prototyping", "technical feasibility"])
            .with_speaking_style("Explains trade-offs plainly and proposes experiments."),
        AgentProfile::new("hr", "Hank", "HR Manager")
            .with_personality(["empathetic", "people-oriented"])
            .with_expertise(["hiring", "culture", "training"])
            .with_speaking_style("Considers team impact and workload."),
    ]
}
