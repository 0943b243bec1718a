use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::meeting::MeetingConfig;

pub mod args;
pub mod meeting;
pub mod simulate;

pub use args::{
    Cli, CliCommand, ControlArgs, ExportArgs, MeetingCliArgs, MeetingCommand, MeetingSetupArgs,
    SimulateCliArgs,
};
pub use meeting::{handle_meeting_command, MeetingClient};
pub use simulate::handle_simulate_command;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

impl From<MeetingSetupArgs> for MeetingConfig {
    fn from(args: MeetingSetupArgs) -> Self {
        let mut config = MeetingConfig::new(args.topic, args.rounds, args.participants);
        config.scenario = args.scenario;
        config.language = args.language;
        config
    }
}

pub fn handle_agents_command(config: &Config) {
    if config.agents.is_empty() {
        println!("No agent profiles configured.");
        return;
    }

    println!("Agents ({}):\n", config.agents.len());
    for agent in &config.agents {
        println!("{:<12} {}", agent.id, agent.label());
        if !agent.expertise.is_empty() {
            let expertise: Vec<&str> = agent.expertise.iter().map(String::as_str).collect();
            println!("{:<12} expertise: {}", "", expertise.join(", "));
        }
        if !agent.speaking_style.is_empty() {
            println!("{:<12} style: {}", "", agent.speaking_style);
        }
    }

    if !config.scenarios.is_empty() {
        println!("\nScenarios:\n");
        for scenario in &config.scenarios {
            println!("{:<16} {}", scenario.name, scenario.description);
        }
    }

    println!(
        "\nModerator: {} ({}) is present in every meeting.",
        config.moderator.name, config.moderator.title
    );
}
