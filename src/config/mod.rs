use crate::agents::{default_profiles, AgentProfile};
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub meeting: MeetingSettings,
    pub moderator: ModeratorConfig,
    #[serde(default = "default_profiles")]
    pub agents: Vec<AgentProfile>,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` for any OpenAI-compatible endpoint, `offline` for canned replies.
    pub provider: String,
    pub api_endpoint: Option<String>,
    /// Falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub summary_temperature: f32,
    pub summary_max_tokens: u32,
}

/// Engine behaviour shared by every meeting the service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingSettings {
    pub max_rounds: u32,
    /// Generation attempts per turn before a placeholder is recorded.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub generation_timeout_secs: u64,
    /// Trailing transcript entries included in a participant prompt.
    pub context_entries: usize,
    /// Character budget for the transcript excerpt in a participant prompt.
    pub context_chars: usize,
    /// Trailing entries given to the closing summary; unset means the whole transcript.
    pub summary_entries: Option<usize>,
    pub announce_opening: bool,
    /// Seconds without initiator activity or a committed turn before `idle_action` applies.
    pub idle_timeout_secs: Option<u64>,
    pub idle_action: IdleAction,
    /// How long an ended, unobserved session stays queryable.
    pub retention_secs: u64,
    /// Pause between turns, for a more conversational pace when watched live.
    pub turn_delay_ms: u64,
    pub language: Option<String>,
    /// Focus per discussion round; `{topic}` and `{round}` are substituted.
    pub round_focus: Vec<String>,
    /// Focus for rounds past the end of `round_focus`.
    pub round_focus_fallback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleAction {
    Pause,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeratorConfig {
    pub name: String,
    pub title: String,
    /// Placeholders: `{name}`, `{title}`, `{topic}`, `{participants}`.
    pub opening_template: String,
    /// Placeholders: `{round}`, `{topic}`, `{focus}`.
    pub framing_template: String,
}

/// A named meeting style selectable per meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Extra guidance added to every participant prompt.
    #[serde(default)]
    pub guidance: String,
    /// Overrides `meeting.round_focus` when non-empty.
    #[serde(default)]
    pub round_focus: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3838,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 400,
            summary_temperature: 0.5,
            summary_max_tokens: 800,
        }
    }
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            max_attempts: 3,
            retry_backoff_ms: 500,
            generation_timeout_secs: 120,
            context_entries: 10,
            context_chars: 6000,
            summary_entries: None,
            announce_opening: true,
            idle_timeout_secs: None,
            idle_action: IdleAction::Pause,
            retention_secs: 3600,
            turn_delay_ms: 0,
            language: None,
            round_focus: vec![
                "Divergent ideation: put as many different ideas about {topic} on the table as possible".to_string(),
                "Convergence: compare the strongest ideas about {topic} and agree on a direction".to_string(),
                "Commitment: turn the chosen direction for {topic} into concrete next steps".to_string(),
            ],
            round_focus_fallback: "Further discussion of {topic} (round {round})".to_string(),
        }
    }
}

impl Default for ModeratorConfig {
    fn default() -> Self {
        Self {
            name: "Morgan".to_string(),
            title: "Meeting Secretary".to_string(),
            opening_template: "Hello everyone, I'm {name}, {title} for today's meeting on \"{topic}\". \
                 Joining us: {participants}. We'll start with short introductions, \
                 then move into the discussion rounds."
                .to_string(),
            framing_template: "Round {round}: {focus}.".to_string(),
        }
    }
}

fn default_scenarios() -> Vec<ScenarioConfig> {
    vec![ScenarioConfig {
        name: "brainstorming".to_string(),
        description: "Open-ended idea generation without early judgement".to_string(),
        guidance: "This is a brainstorming session. Every idea is welcome; build on what others said \
             instead of criticising it, and don't worry yet about feasibility."
            .to_string(),
        round_focus: vec![
            "Free ideation: propose as many ideas about {topic} as you can".to_string(),
            "Expansion: extend and stretch the ideas already raised about {topic}".to_string(),
            "Combination: merge related ideas about {topic} into fuller proposals".to_string(),
            "Evaluation: pick the most promising directions for {topic}".to_string(),
        ],
    }]
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, writing the defaults there first if it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default_with_cast();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Defaults including the stock agents and scenarios.
    ///
    /// `Config::default()` leaves both lists empty; the serde defaults only
    /// apply while deserializing.
    pub fn default_with_cast() -> Self {
        Self {
            agents: default_profiles(),
            scenarios: default_scenarios(),
            ..Self::default()
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// API key from the config file, else from `OPENAI_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
