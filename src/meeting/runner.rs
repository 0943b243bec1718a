//! Per-session driver task.
//!
//! Plans a turn under the session lock, generates without holding it, then
//! commits under the lock again. Control commands interleave freely: they bump
//! the session epoch and cancel the turn token, so whatever the runner was
//! generating is discarded at commit time.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::completion::{CompletionGateway, GenerationError};

use super::session::{RunnerStep, SessionHandle, TurnPlan};
use super::settings::EngineSettings;

pub async fn run_session(
    handle: SessionHandle,
    gateway: Arc<dyn CompletionGateway>,
    settings: Arc<EngineSettings>,
) {
    let session_id = handle.id();
    debug!("Runner for meeting {} started", session_id);

    loop {
        let step = handle
            .lock()
            .await
            .next_step(settings.idle_timeout, settings.idle_action);

        let plan = match step {
            RunnerStep::Finished => break,
            RunnerStep::Wait(None) => {
                handle.woken().await;
                continue;
            }
            RunnerStep::Wait(Some(remaining)) => {
                tokio::select! {
                    _ = handle.woken() => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
                continue;
            }
            RunnerStep::Generate(plan) => plan,
        };

        let outcome = generate_with_retries(gateway.as_ref(), &plan, &settings).await;

        let committed = {
            let mut session = handle.lock().await;
            match session.commit(plan.turn, plan.epoch, outcome) {
                Ok(committed) => committed,
                Err(err) => {
                    warn!("Meeting {} could not commit {:?}: {}", session_id, plan.turn, err);
                    false
                }
            }
        };

        // Controls take effect under the lock, so pacing never has to be interrupted.
        if committed && !settings.turn_delay.is_zero() {
            tokio::time::sleep(settings.turn_delay).await;
        }
    }

    info!("Runner for meeting {} finished", session_id);
}

/// Up to `max_attempts` attempts, each bounded by the generation timeout and
/// raced against the turn's cancellation token. Blank replies count as failures.
pub async fn generate_with_retries(
    gateway: &dyn CompletionGateway,
    plan: &TurnPlan,
    settings: &EngineSettings,
) -> Result<String, GenerationError> {
    let attempts = settings.max_attempts.max(1);
    let mut last_error = GenerationError::Empty;

    for attempt in 1..=attempts {
        let attempt_result = tokio::select! {
            biased;
            _ = plan.cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = tokio::time::timeout(
                settings.generation_timeout,
                gateway.generate(&plan.prompt, &plan.agent, &plan.cancel),
            ) => result.unwrap_or(Err(GenerationError::Timeout(settings.generation_timeout))),
        };

        match attempt_result {
            Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
            Ok(_) => last_error = GenerationError::Empty,
            Err(GenerationError::Cancelled) => return Err(GenerationError::Cancelled),
            Err(err) => last_error = err,
        }

        warn!(
            "Attempt {}/{} for {} ({:?}) failed: {}",
            attempt, attempts, plan.agent.id, plan.turn, last_error
        );

        if attempt < attempts {
            tokio::select! {
                biased;
                _ = plan.cancel.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(backoff(settings.retry_backoff, attempt)) => {}
            }
        }
    }

    Err(last_error)
}

/// Linear backoff: the configured delay times the attempt number.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}
