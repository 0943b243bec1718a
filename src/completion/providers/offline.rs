use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CompletionGateway, GenerationError};
use crate::agents::{AgentProfile, MODERATOR_ID};

const PARTICIPANT_REPLIES: [&str; 4] = [
    "Speaking as {title}, I'd start from {focus}: it is where we can move fastest with the least risk.",
    "From the {title} side, {focus} is the part I would not compromise on. Let's size it before we commit.",
    "I hear the points so far. My concern as {title} is {focus}; we should agree on an owner for it.",
    "Building on that, {focus} gives us a measurable first step. I can draft a proposal by next week.",
];

/// Canned, deterministic replies so a meeting can run without a language model.
#[derive(Debug, Default, Clone)]
pub struct OfflineGateway;

impl OfflineGateway {
    pub fn new() -> Self {
        Self
    }

    fn reply(prompt: &str, agent: &AgentProfile) -> String {
        if agent.id == MODERATOR_ID {
            return "Summary: the participants shared their perspectives and agreed to follow up \
                    on the ideas raised. 1. Circulate the notes. 2. Assign owners to each open \
                    point. Open question: what should be decided first?"
                .to_string();
        }

        let seed = fingerprint(prompt) ^ fingerprint(&agent.id);
        let focus = if agent.expertise.is_empty() {
            "the practical details".to_string()
        } else {
            let index = (seed as usize) % agent.expertise.len();
            agent
                .expertise
                .iter()
                .nth(index)
                .cloned()
                .unwrap_or_default()
        };
        let template = PARTICIPANT_REPLIES[(seed as usize) % PARTICIPANT_REPLIES.len()];

        format!(
            "{}: {}",
            agent.name,
            template
                .replace("{title}", &agent.title)
                .replace("{focus}", &focus)
        )
    }
}

/// FNV-1a; stable across runs and platforms.
fn fingerprint(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl CompletionGateway for OfflineGateway {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn generate(
        &self,
        prompt: &str,
        agent: &AgentProfile,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        debug!("Offline reply for {}", agent.id);
        Ok(Self::reply(prompt, agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_are_deterministic_and_in_character() {
        let gateway = OfflineGateway::new();
        let agent = AgentProfile::new("finance", "Frank", "Finance Manager")
            .with_expertise(["budgeting", "forecasting"]);
        let cancel = CancellationToken::new();

        let first = gateway.generate("prompt", &agent, &cancel).await.unwrap();
        let second = gateway.generate("prompt", &agent, &cancel).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("Frank: "));
    }

    #[tokio::test]
    async fn test_moderator_gets_summary() {
        let gateway = OfflineGateway::new();
        let moderator = AgentProfile::new(MODERATOR_ID, "Morgan", "Meeting Secretary");
        let text = gateway
            .generate("summarise", &moderator, &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.starts_with("Summary:"));
    }

    #[tokio::test]
    async fn test_respects_cancellation() {
        let gateway = OfflineGateway::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agent = AgentProfile::new("a", "Alice", "Analyst");
        assert_eq!(
            gateway.generate("p", &agent, &cancel).await,
            Err(GenerationError::Cancelled)
        );
    }
}
