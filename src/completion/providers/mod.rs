use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentProfile;

pub mod offline;
pub mod openai_api;

pub use offline::OfflineGateway;
pub use openai_api::OpenAIGateway;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation cancelled")]
    Cancelled,

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider returned an empty response")]
    Empty,
}

/// A text completion backend. One call is one attempt; retrying is up to the caller.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generate `agent`'s reply to `prompt`. Implementations should return
    /// [`GenerationError::Cancelled`] promptly once `cancel` fires.
    async fn generate(
        &self,
        prompt: &str,
        agent: &AgentProfile,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>;
}
