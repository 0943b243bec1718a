use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::export::ExportFormat;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:3838";

#[derive(Parser, Debug)]
#[command(name = "roundtable")]
#[command(about = "Moderated multi-agent meetings", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List configured agent profiles and scenarios
    Agents,
    /// Start, steer and export meetings on a running service
    Meeting(MeetingCliArgs),
    /// Run a meeting in-process and print its transcript
    Simulate(SimulateCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct MeetingCliArgs {
    /// Base URL of the Roundtable service
    #[arg(long, global = true, default_value = DEFAULT_SERVICE_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: MeetingCommand,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct MeetingSetupArgs {
    /// Meeting topic
    pub topic: String,
    /// Participant ids in speaking order, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub participants: Vec<String>,
    /// Number of discussion rounds
    #[arg(short, long, default_value_t = 3)]
    pub rounds: u32,
    /// Scenario name, e.g. brainstorming
    #[arg(short, long)]
    pub scenario: Option<String>,
    /// Language participants should answer in
    #[arg(short, long)]
    pub language: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct ControlArgs {
    /// Meeting id
    pub id: Uuid,
    /// Control token returned when the meeting was started
    #[arg(short, long)]
    pub token: String,
}

#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Markdown)]
    pub format: ExportFormat,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum MeetingCommand {
    /// Start a meeting and print its id and control token
    Start(MeetingSetupArgs),
    /// List meetings known to the service
    List,
    /// Show the state of a meeting
    Status {
        /// Meeting id
        id: Uuid,
    },
    /// Pause after cancelling the turn in progress
    Pause(ControlArgs),
    /// Resume a paused meeting
    Resume(ControlArgs),
    /// Stop the meeting for good
    Stop(ControlArgs),
    /// Skip the current speaker
    Skip(ControlArgs),
    /// Skip to the moderator's summary
    Conclude(ControlArgs),
    /// Tell an idle-limited meeting the initiator is still there
    Heartbeat(ControlArgs),
    /// Export the transcript
    Export {
        /// Meeting id
        id: Uuid,
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(ClapArgs, Debug)]
pub struct SimulateCliArgs {
    #[command(flatten)]
    pub setup: MeetingSetupArgs,

    #[command(flatten)]
    pub export: ExportArgs,

    /// Use canned offline replies instead of the configured provider
    #[arg(long)]
    pub offline: bool,

    /// Print entries as they are spoken instead of showing a progress bar
    #[arg(long)]
    pub live: bool,
}
