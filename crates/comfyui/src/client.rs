//! High-level client for running jobs on a ComfyUI gateway.
//!
//! [`ComfyUIClient::submit_and_watch`] submits a job (with retries) and
//! starts the background poll loop; [`ComfyUIClient::fetch_result`]
//! pulls the final artifact once the job reports `complete`.

use std::sync::Arc;
use std::time::Duration;

use comfybridge_core::context::{CancelReason, JobContext};
use comfybridge_core::types::JobHandle;
use serde::Serialize;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::config::ComfyUIConfig;
use crate::messages::{ResultArtifact, WorkflowRequest};
use crate::poller::{spawn_poll_loop, JobWatch};
use crate::retry::{submit_with_retry, RetryConfig};

/// Submission and polling front-end for one gateway.
///
/// Holds no per-job state; each call to
/// [`submit_and_watch`](Self::submit_and_watch) owns its own channels
/// and poll task, so a single client can be shared across requests.
pub struct ComfyUIClient {
    api: Arc<ComfyUIApi>,
    retry: RetryConfig,
    poll_interval: Duration,
}

/// Errors surfaced by [`ComfyUIClient`].
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// The job description could not be encoded as JSON.
    #[error("Failed to serialize workflow payload: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Every submission attempt failed.
    #[error("Submit failed after {attempts} attempts: {source}")]
    SubmitExhausted {
        attempts: u32,
        #[source]
        source: ComfyUIApiError,
    },

    /// A single gateway call failed (status poll, result fetch, or an
    /// undecodable submit response).
    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    /// The job context ended before the operation finished.
    #[error("Operation aborted: {0}")]
    Cancelled(CancelReason),
}

impl ComfyUIClient {
    /// Build a client from configuration.
    pub fn new(config: &ComfyUIConfig) -> Result<Self, ComfyUIClientError> {
        let api = ComfyUIApi::new(config.host.clone(), config.request_timeout)?;
        Ok(Self::with_api(api, config.retry.clone(), config.poll_interval))
    }

    /// Build a client around an existing [`ComfyUIApi`].
    pub fn with_api(api: ComfyUIApi, retry: RetryConfig, poll_interval: Duration) -> Self {
        Self {
            api: Arc::new(api),
            retry,
            poll_interval,
        }
    }

    /// Gateway base URL.
    pub fn api_url(&self) -> &str {
        self.api.api_url()
    }

    /// Submit `job` and start watching its progress.
    ///
    /// Serialization failures return immediately without touching the
    /// network. Submission is retried per the configured
    /// [`RetryConfig`]; if no handle is obtained, no poll loop starts.
    /// On success exactly one poll loop is spawned, bound to `ctx`.
    pub async fn submit_and_watch<J>(
        &self,
        ctx: &JobContext,
        job: &J,
    ) -> Result<JobWatch, ComfyUIClientError>
    where
        J: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(&WorkflowRequest { workflow_json: job })
            .map_err(ComfyUIClientError::Serialize)?;

        let submitted = submit_with_retry(&self.api, &payload, &self.retry, ctx).await?;

        Ok(spawn_poll_loop(
            Arc::clone(&self.api),
            submitted.task_id,
            self.poll_interval,
            ctx.clone(),
        ))
    }

    /// Fetch the final artifact of a completed job.
    ///
    /// One request, no retry. Cancelled together with `ctx`.
    pub async fn fetch_result(
        &self,
        ctx: &JobContext,
        handle: &JobHandle,
    ) -> Result<ResultArtifact, ComfyUIClientError> {
        tokio::select! {
            biased;
            reason = ctx.done() => Err(ComfyUIClientError::Cancelled(reason)),
            result = self.api.get_result(handle) => {
                result.map_err(|e| {
                    tracing::warn!(task_id = %handle, error = %e, "Result fetch failed");
                    ComfyUIClientError::Api(e)
                })
            }
        }
    }
}
