//! Background status polling for one submitted job.
//!
//! [`spawn_poll_loop`] starts exactly one task per job. The task polls
//! the gateway on a fixed interval and hands each decoded
//! [`ProgressEvent`] to the consumer through a capacity-1 channel, so
//! a slow consumer holds the loop back instead of letting events pile
//! up. Any failure ends the loop; polling never retries.
//!
//! Both channels are closed exactly once, when the task returns and
//! drops its senders.

use std::sync::Arc;
use std::time::Duration;

use comfybridge_core::context::JobContext;
use comfybridge_core::types::JobHandle;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::task::AbortOnDropHandle;

use crate::api::ComfyUIApi;
use crate::client::ComfyUIClientError;
use crate::messages::ProgressEvent;

/// Live view of a job's poll loop.
///
/// `events` yields progress in the order the gateway reported it and
/// ends after a terminal phase. `errors` carries at most one error,
/// after which `events` closes without further items. Dropping the
/// watch aborts the background task.
pub struct JobWatch {
    handle: JobHandle,
    pub events: mpsc::Receiver<ProgressEvent>,
    pub errors: mpsc::Receiver<ComfyUIClientError>,
    task: AbortOnDropHandle<()>,
}

impl std::fmt::Debug for JobWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWatch")
            .field("handle", &self.handle)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl JobWatch {
    /// Correlation handle of the watched job.
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Whether the poll loop has already returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poll loop to return.
    ///
    /// Callers should cancel the job context first unless the loop is
    /// known to have reached a terminal condition.
    pub async fn join(self) {
        let JobWatch {
            handle,
            events,
            errors,
            task,
        } = self;
        // Drop the receivers so a loop blocked on a send sees the
        // consumer is gone and exits.
        drop(events);
        drop(errors);
        if let Err(e) = task.await {
            tracing::error!(task_id = %handle, error = %e, "Poll task panicked");
        }
    }
}

/// Start the poll loop for `handle`.
pub(crate) fn spawn_poll_loop(
    api: Arc<ComfyUIApi>,
    handle: JobHandle,
    interval: Duration,
    ctx: JobContext,
) -> JobWatch {
    let (events_tx, events) = mpsc::channel(1);
    let (errors_tx, errors) = mpsc::channel(1);

    let task_handle = handle.clone();
    let task = tokio::spawn(async move {
        tracing::debug!(task_id = %task_handle, "Poll loop started");
        run_poll_loop(&api, &task_handle, interval, &ctx, &events_tx, &errors_tx).await;
        tracing::debug!(task_id = %task_handle, "Poll loop exited");
    });

    JobWatch {
        handle,
        events,
        errors,
        task: AbortOnDropHandle::new(task),
    }
}

/// Core poll loop: wait for tick -> fetch status -> forward event.
///
/// Returns on the first terminal condition; the caller's senders are
/// dropped right after, closing both channels.
async fn run_poll_loop(
    api: &ComfyUIApi,
    handle: &JobHandle,
    interval: Duration,
    ctx: &JobContext,
    events_tx: &mpsc::Sender<ProgressEvent>,
    errors_tx: &mpsc::Sender<ComfyUIClientError>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            reason = ctx.done() => {
                tracing::info!(task_id = %handle, %reason, "Polling cancelled");
                report(errors_tx, ComfyUIClientError::Cancelled(reason));
                return;
            }
            _ = ticker.tick() => {}
        }

        let status = tokio::select! {
            biased;
            reason = ctx.done() => {
                tracing::info!(task_id = %handle, %reason, "Polling cancelled mid-request");
                report(errors_tx, ComfyUIClientError::Cancelled(reason));
                return;
            }
            status = api.get_status(handle) => status,
        };

        let event = match status {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(task_id = %handle, error = %e, "Status poll failed");
                report(errors_tx, ComfyUIClientError::Api(e));
                return;
            }
        };

        let terminal = event.phase.is_terminal();
        tracing::debug!(
            task_id = %handle,
            phase = ?event.phase,
            progress = event.progress,
            "Polled job status",
        );

        tokio::select! {
            biased;
            reason = ctx.done() => {
                report(errors_tx, ComfyUIClientError::Cancelled(reason));
                return;
            }
            sent = events_tx.send(event) => {
                if sent.is_err() {
                    tracing::debug!(task_id = %handle, "Event consumer dropped");
                    return;
                }
            }
        }

        if terminal {
            return;
        }
    }
}

/// Deliver the loop's single error. The channel has room for exactly
/// one, and the loop returns right after reporting.
fn report(errors_tx: &mpsc::Sender<ComfyUIClientError>, err: ComfyUIClientError) {
    if errors_tx.try_send(err).is_err() {
        tracing::debug!("Error consumer dropped");
    }
}
