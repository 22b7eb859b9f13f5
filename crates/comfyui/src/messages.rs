//! Wire types exchanged with the ComfyUI generation gateway.
//!
//! The gateway speaks plain JSON over HTTP: a workflow submission
//! returns a `task_id`, status polls return one [`ProgressEvent`] per
//! call, and the result endpoint returns a [`ResultArtifact`].

use chrono::{DateTime, Utc};
use comfybridge_core::types::JobHandle;
use serde::{Deserialize, Deserializer, Serialize};

/// Caller-supplied workflow document, forwarded to the gateway verbatim.
pub type JobDescription = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /api/submit-workflow`.
#[derive(Debug, Serialize)]
pub struct WorkflowRequest<'a, J: ?Sized> {
    pub workflow_json: &'a J,
}

/// Response returned by the gateway after queuing a workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: JobHandle,
}

/// Lifecycle phase reported by a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Submitted,
    Rendering,
    Complete,
    Error,
}

impl Phase {
    /// `complete` and `error` end the job; no event follows either.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }
}

/// One polled snapshot of a job's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: JobHandle,
    pub phase: Phase,
    /// Fraction complete, clamped into `0.0..=1.0` on decode.
    #[serde(default, deserialize_with = "unit_fraction")]
    pub progress: f32,
    /// Stamped with the receive time when the gateway omits it.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Final output of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArtifact {
    pub task_id: JobHandle,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub video: Option<String>,
}

/// Out-of-range progress is clamped rather than failing the poll.
fn unit_fraction<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f32::deserialize(deserializer)?;
    Ok(value.clamp(0.0, 1.0))
}

/// The gateway sends `"video": ""` for image-only jobs.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
