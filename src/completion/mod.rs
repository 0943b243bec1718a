use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, LlmConfig};

pub mod providers;

pub use providers::{CompletionGateway, GenerationError, OfflineGateway, OpenAIGateway};

/// Settings a provider is built from.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub summary_temperature: f32,
    pub summary_max_tokens: u32,
}

impl From<&LlmConfig> for GatewayConfig {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            api_endpoint: llm.api_endpoint.clone(),
            api_key: llm.api_key.clone(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            summary_temperature: llm.summary_temperature,
            summary_max_tokens: llm.summary_max_tokens,
        }
    }
}

pub fn with_provider(provider_name: &str, config: GatewayConfig) -> Result<Arc<dyn CompletionGateway>> {
    let gateway: Arc<dyn CompletionGateway> = match provider_name {
        "openai" => match config.api_key.clone().filter(|k| !k.trim().is_empty()) {
            Some(api_key) => Arc::new(OpenAIGateway::new(api_key, config)?),
            None => {
                warn!("No API key configured for the openai provider; using offline replies");
                Arc::new(OfflineGateway::new())
            }
        },
        "offline" => Arc::new(OfflineGateway::new()),
        _ => bail!(
            "Unknown completion provider '{}'. Supported providers: openai, offline",
            provider_name
        ),
    };

    info!("Using {} for completions", gateway.name());
    Ok(gateway)
}

/// Build the gateway selected in `config.llm`, resolving the API key from the
/// environment when the config leaves it unset.
pub fn build_gateway(config: &Config) -> Result<Arc<dyn CompletionGateway>> {
    let mut gateway_config = GatewayConfig::from(&config.llm);
    gateway_config.api_key = config.resolved_api_key();
    with_provider(&config.llm.provider, gateway_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_config(api_key: Option<&str>) -> GatewayConfig {
        let mut config = GatewayConfig::from(&LlmConfig::default());
        config.api_key = api_key.map(str::to_string);
        config
    }

    #[test]
    fn test_offline_provider_selected_by_name() {
        let gateway = with_provider("offline", gateway_config(None)).unwrap();
        assert_eq!(gateway.name(), "offline");
    }

    #[test]
    fn test_openai_without_key_falls_back_to_offline() {
        let gateway = with_provider("openai", gateway_config(Some("  "))).unwrap();
        assert_eq!(gateway.name(), "offline");
    }

    #[test]
    fn test_openai_with_key() {
        let gateway = with_provider("openai", gateway_config(Some("sk-test"))).unwrap();
        assert_eq!(gateway.name(), "openai");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = with_provider("carrier-pigeon", gateway_config(None))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown completion provider"));
    }
}
