//! Linear-backoff retry for workflow submission.
//!
//! Submission is the only stage that retries. Attempt `i` (1-indexed)
//! that fails is followed by a pause of `i` backoff units before
//! attempt `i + 1`, so the worst-case wait is predictable:
//! `unit * n * (n - 1) / 2` for `n` attempts.

use std::time::Duration;

use comfybridge_core::context::JobContext;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::ComfyUIClientError;
use crate::messages::SubmitResponse;

/// Tunable parameters for the submission retry strategy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total submission attempts, including the first. Never below 1.
    pub attempts: u32,
    /// Pause after the first failed attempt; later pauses are multiples.
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Delay to wait after failed attempt number `attempt` (1-indexed).
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    config.backoff_unit.saturating_mul(attempt)
}

/// Submit `payload`, retrying transport errors and non-success statuses.
///
/// Gives up with [`ComfyUIClientError::SubmitExhausted`] once
/// `config.attempts` calls have failed. Cancellation of `ctx` aborts
/// both an in-flight request and a pending backoff pause.
pub async fn submit_with_retry(
    api: &ComfyUIApi,
    payload: &[u8],
    config: &RetryConfig,
    ctx: &JobContext,
) -> Result<SubmitResponse, ComfyUIClientError> {
    let attempts = config.attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            reason = ctx.done() => return Err(ComfyUIClientError::Cancelled(reason)),
            outcome = api.submit_workflow(payload) => outcome,
        };

        let err: ComfyUIApiError = match outcome {
            Ok(response) => {
                tracing::info!(
                    task_id = %response.task_id,
                    attempt,
                    "Workflow submitted to ComfyUI",
                );
                return Ok(response);
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!(attempt, error = %e, "Undecodable submit response");
                return Err(ComfyUIClientError::Api(e));
            }
            Err(e) => e,
        };

        if attempt >= attempts {
            tracing::error!(attempts, error = %err, "Submission retries exhausted");
            return Err(ComfyUIClientError::SubmitExhausted {
                attempts,
                source: err,
            });
        }

        let delay = backoff_delay(attempt, config);
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Submit attempt {attempt} failed",
        );

        tokio::select! {
            biased;
            reason = ctx.done() => return Err(ComfyUIClientError::Cancelled(reason)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
