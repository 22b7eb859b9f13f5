//! One streaming session: gateway events in, SSE frames out.
//!
//! [`run_session`] waits on four sources at once (the next progress
//! event, the poll loop's error signal, the client going away, and the
//! job deadline) and turns each into frames until one of them ends the
//! session. On the way out it cancels the job context and joins the
//! poll task, so no background polling outlives the stream.

use std::time::Duration;

use comfybridge_comfyui::messages::{Phase, ProgressEvent};
use comfybridge_comfyui::{ComfyUIClient, ComfyUIClientError, JobWatch};
use comfybridge_core::context::{CancelReason, JobContext};
use comfybridge_core::types::JobHandle;

use crate::bridge::frame::{FrameError, FrameKind, FrameWriter};

/// Message carried by the `error` frame written on a deadline.
pub const TIMEOUT_MESSAGE: &str = "timeout";

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Deadline for the artifact fetch once a job reports `complete`.
    pub result_fetch_timeout: Duration,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The job completed. `result_delivered` is false when the artifact
    /// fetch failed and the `result` frame was omitted.
    Completed { result_delivered: bool },
    /// The gateway reported the job in the `error` phase.
    RemoteFailed,
    /// Polling failed; an `error` frame was written.
    Failed,
    /// The job deadline passed; a timeout `error` frame was written.
    TimedOut,
    /// The client went away; nothing more could be written.
    Disconnected,
    /// The event stream ended without a terminal phase or an error.
    Closed,
    /// A frame could not be encoded.
    WriteFailed,
}

/// Stream `watch` to `writer` until the job reaches a terminal condition.
pub async fn run_session(
    client: &ComfyUIClient,
    ctx: JobContext,
    mut watch: JobWatch,
    writer: FrameWriter,
    settings: &BridgeSettings,
) -> SessionOutcome {
    let task_id = watch.handle().clone();
    tracing::info!(task_id = %task_id, "Streaming job progress");

    let outcome = stream_events(client, &ctx, &mut watch, &writer, settings).await;

    // Stop the poll loop (a no-op if it already finished) and wait for
    // it so nothing keeps polling after the response ends.
    ctx.cancel();
    watch.join().await;

    match outcome {
        SessionOutcome::Completed { .. } => {
            tracing::info!(task_id = %task_id, ?outcome, "Stream session finished");
        }
        SessionOutcome::Disconnected => {
            tracing::info!(task_id = %task_id, "Client disconnected, job cancelled");
        }
        _ => {
            tracing::warn!(task_id = %task_id, ?outcome, "Stream session ended early");
        }
    }
    outcome
}

/// The multiplexed wait loop.
async fn stream_events(
    client: &ComfyUIClient,
    ctx: &JobContext,
    watch: &mut JobWatch,
    writer: &FrameWriter,
    settings: &BridgeSettings,
) -> SessionOutcome {
    let task_id = watch.handle().clone();

    loop {
        tokio::select! {
            biased;

            _ = writer.closed() => return SessionOutcome::Disconnected,

            event = watch.events.recv() => {
                let Some(event) = event else {
                    // The loop reports its error before closing, so a
                    // pending error explains the close.
                    return match watch.errors.try_recv() {
                        Ok(err) => write_failure(&task_id, writer, err).await,
                        Err(_) => {
                            tracing::warn!(task_id = %task_id, "Event stream closed without a terminal phase");
                            SessionOutcome::Closed
                        }
                    };
                };
                if let Some(outcome) =
                    handle_event(client, ctx, &task_id, writer, settings, event).await
                {
                    return outcome;
                }
            }

            Some(err) = watch.errors.recv() => {
                return write_failure(&task_id, writer, err).await;
            }

            _ = ctx.deadline_elapsed() => {
                tracing::warn!(task_id = %task_id, "Generation deadline elapsed");
                return write_timeout(writer).await;
            }
        }
    }
}

/// Forward one progress event. Returns an outcome when it ends the session.
async fn handle_event(
    client: &ComfyUIClient,
    ctx: &JobContext,
    task_id: &JobHandle,
    writer: &FrameWriter,
    settings: &BridgeSettings,
    event: ProgressEvent,
) -> Option<SessionOutcome> {
    let phase = event.phase;
    if let Err(e) = writer.send(FrameKind::Progress, &event).await {
        return Some(frame_error_outcome(task_id, e));
    }

    match phase {
        Phase::Complete => Some(deliver_result(client, ctx, task_id, writer, settings).await),
        Phase::Error => {
            tracing::warn!(task_id = %task_id, "Generation service reported job failure");
            let message = format!("job {task_id} failed on the generation service");
            Some(match writer.send_error(message).await {
                Ok(()) => SessionOutcome::RemoteFailed,
                Err(e) => frame_error_outcome(task_id, e),
            })
        }
        Phase::Submitted | Phase::Rendering => None,
    }
}

/// Fetch the artifact under a short deadline and write it as a `result` frame.
///
/// A failed fetch is logged and the frame omitted; the job itself
/// still completed.
async fn deliver_result(
    client: &ComfyUIClient,
    ctx: &JobContext,
    task_id: &JobHandle,
    writer: &FrameWriter,
    settings: &BridgeSettings,
) -> SessionOutcome {
    let fetch_ctx = ctx.child_with_timeout(settings.result_fetch_timeout);
    let result = match client.fetch_result(&fetch_ctx, task_id).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Failed to fetch generation result");
            return SessionOutcome::Completed {
                result_delivered: false,
            };
        }
    };

    match writer.send(FrameKind::Result, &result).await {
        Ok(()) => SessionOutcome::Completed {
            result_delivered: true,
        },
        Err(e) => frame_error_outcome(task_id, e),
    }
}

/// Write the single `error` frame for a poll-loop failure.
async fn write_failure(
    task_id: &JobHandle,
    writer: &FrameWriter,
    err: ComfyUIClientError,
) -> SessionOutcome {
    if let ComfyUIClientError::Cancelled(CancelReason::DeadlineExceeded) = err {
        tracing::warn!(task_id = %task_id, "Generation deadline elapsed during polling");
        return write_timeout(writer).await;
    }

    tracing::error!(task_id = %task_id, error = %err, "Progress polling failed");
    match writer.send_error(err.to_string()).await {
        Ok(()) => SessionOutcome::Failed,
        Err(e) => frame_error_outcome(task_id, e),
    }
}

async fn write_timeout(writer: &FrameWriter) -> SessionOutcome {
    match writer.send_error(TIMEOUT_MESSAGE).await {
        Ok(()) => SessionOutcome::TimedOut,
        Err(_) => SessionOutcome::Disconnected,
    }
}

fn frame_error_outcome(task_id: &JobHandle, err: FrameError) -> SessionOutcome {
    match err {
        FrameError::Disconnected => SessionOutcome::Disconnected,
        FrameError::Encode { .. } => {
            tracing::error!(task_id = %task_id, error = %err, "Failed to write frame");
            SessionOutcome::WriteFailed
        }
    }
}
