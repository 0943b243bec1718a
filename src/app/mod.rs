use crate::agents::AgentProfileStore;
use crate::api::ApiServer;
use crate::completion;
use crate::config::Config;
use crate::meeting::{EngineSettings, MeetingRegistry};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// How often ended meetings are checked for release.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting Roundtable service");

    let registry = Arc::new(build_registry(&config)?);
    spawn_sweeper(Arc::clone(&registry));

    info!(
        "Roundtable is ready with {} agent(s) and {} completions",
        registry.profiles().len(),
        registry.gateway_name()
    );
    info!(
        "Try: curl -X POST http://{}:{}/meetings -H 'content-type: application/json' \
         -d '{{\"topic\":\"Q3 launch plan\",\"rounds\":2,\"participants\":[\"marketing\",\"finance\"]}}'",
        config.server.host, config.server.port
    );

    let api_server = ApiServer::new(registry, &config.server);
    if let Err(e) = api_server.start().await {
        error!("API server failed: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Registry wired from configuration: profile store, gateway and engine settings.
pub fn build_registry(config: &Config) -> Result<MeetingRegistry> {
    let profiles = AgentProfileStore::new(config.agents.clone());
    if profiles.is_empty() {
        bail!("No agent profiles configured; add at least one [[agents]] entry to the config file");
    }

    let gateway = completion::build_gateway(config)?;
    let settings = EngineSettings::from(config);

    Ok(MeetingRegistry::new(
        Arc::new(profiles),
        gateway,
        Arc::new(settings),
    ))
}

fn spawn_sweeper(registry: Arc<MeetingRegistry>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            registry.sweep().await;
        }
    });
}
