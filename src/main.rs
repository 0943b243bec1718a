use anyhow::Result;
use clap::Parser;
use roundtable::{
    app,
    cli::{
        handle_agents_command, handle_meeting_command, handle_simulate_command, load_config, Cli,
        CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("Roundtable {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Agents) => {
            let config = load_config(cli.config.as_deref())?;
            handle_agents_command(&config);
            return Ok(());
        }
        Some(CliCommand::Meeting(args)) => {
            handle_meeting_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Simulate(args)) => {
            let config = load_config(cli.config.as_deref())?;
            handle_simulate_command(args, config).await?;
            return Ok(());
        }
        None => {}
    }

    let config = load_config(cli.config.as_deref())?;
    app::run_service(config).await
}
