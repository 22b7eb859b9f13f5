//! Handlers for generation jobs on the ComfyUI gateway.
//!
//! Routes:
//! - `POST /comfyui/generate`: submit a workflow and stream progress
//! - `GET /comfyui/result/{task_id}`: fetch a finished job's artifact

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use comfybridge_comfyui::messages::JobDescription;
use comfybridge_core::context::JobContext;
use comfybridge_core::types::JobHandle;

use crate::bridge::{frame, run_session, BridgeSettings};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Deadline for a direct result lookup.
const RESULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// POST /api/v1/comfyui/generate
///
/// Submits the workflow (with retries) before any response is sent. A
/// submission failure is returned as a plain JSON error; otherwise the
/// response is a `text/event-stream` of `progress`, `result`, and
/// `error` frames that ends with the job.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<JobDescription>, JsonRejection>,
) -> AppResult<Response> {
    let Json(workflow) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let ctx = JobContext::with_timeout(state.config.generation_timeout());

    let watch = state
        .comfyui
        .submit_and_watch(&ctx, &workflow)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to submit generation job");
            AppError::Upstream(e)
        })?;

    let (writer, frames) = frame::channel();
    let client = Arc::clone(&state.comfyui);
    let settings = BridgeSettings {
        result_fetch_timeout: state.config.result_fetch_timeout(),
    };

    tokio::spawn(async move {
        run_session(&client, ctx, watch, writer, &settings).await;
    });

    Ok(frame::event_stream_response(frames))
}

/// GET /api/v1/comfyui/result/{task_id}
///
/// Returns the artifact of a finished job directly from the gateway.
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let handle = JobHandle::new(task_id)?;
    let ctx = JobContext::with_timeout(RESULT_LOOKUP_TIMEOUT);

    let result = state
        .comfyui
        .fetch_result(&ctx, &handle)
        .await
        .map_err(|e| {
            tracing::error!(task_id = %handle, error = %e, "Failed to fetch generation result");
            AppError::Upstream(e)
        })?;

    Ok(Json(result))
}
