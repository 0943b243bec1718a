use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{CompletionGateway, GenerationError};
use crate::agents::{AgentProfile, MODERATOR_ID};
use crate::completion::GatewayConfig;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat completions against any OpenAI-compatible endpoint.
pub struct OpenAIGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: GatewayConfig,
}

impl OpenAIGateway {
    pub fn new(api_key: String, config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| OPENAI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        info!(
            "Initialized OpenAI gateway with base URL: {} (model {})",
            base_url, config.model
        );

        Ok(Self {
            client,
            api_key,
            base_url,
            config,
        })
    }

    /// Sampling parameters for `agent`: the moderator's summary gets its own
    /// budget, participants may override the temperature.
    fn sampling(&self, agent: &AgentProfile) -> (f32, u32) {
        if agent.id == MODERATOR_ID {
            (self.config.summary_temperature, self.config.summary_max_tokens)
        } else {
            (
                agent.temperature.unwrap_or(self.config.temperature),
                self.config.max_tokens,
            )
        }
    }

    async fn complete(&self, prompt: &str, agent: &AgentProfile) -> Result<String, GenerationError> {
        let (temperature, max_tokens) = self.sampling(agent);
        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
        };

        debug!(
            "Requesting completion for {} ({} prompt chars)",
            agent.id,
            prompt.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat completion failed with status {}: {}", status, body);
            return Err(GenerationError::Provider(format!(
                "status {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("invalid response: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GenerationError::Empty);
        }

        debug!("Completion for {} returned {} chars", agent.id, content.len());
        Ok(content)
    }
}

#[async_trait]
impl CompletionGateway for OpenAIGateway {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &str,
        agent: &AgentProfile,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = self.complete(prompt, agent) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn gateway(endpoint: Option<&str>) -> OpenAIGateway {
        let mut config = GatewayConfig::from(&LlmConfig::default());
        config.api_endpoint = endpoint.map(str::to_string);
        OpenAIGateway::new("sk-test".to_string(), config).unwrap()
    }

    #[test]
    fn test_endpoint_defaults_and_trailing_slash() {
        assert_eq!(gateway(None).base_url, OPENAI_API_BASE);
        assert_eq!(
            gateway(Some("http://localhost:11434/v1/")).base_url,
            "http://localhost:11434/v1"
        );
    }

    #[test]
    fn test_sampling_per_agent() {
        let g = gateway(None);
        let plain = AgentProfile::new("a", "Alice", "Analyst");
        let warm = AgentProfile::new("b", "Bob", "Builder").with_temperature(1.1);
        let moderator = AgentProfile::new(MODERATOR_ID, "Morgan", "Secretary");

        assert_eq!(g.sampling(&plain), (0.7, 400));
        assert_eq!(g.sampling(&warm), (1.1, 400));
        assert_eq!(g.sampling(&moderator), (0.5, 800));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let g = gateway(Some("http://127.0.0.1:9"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agent = AgentProfile::new("a", "Alice", "Analyst");
        assert_eq!(
            g.generate("hi", &agent, &cancel).await,
            Err(GenerationError::Cancelled)
        );
    }
}
