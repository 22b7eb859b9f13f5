//! Cancellable execution context for a single generation job.
//!
//! A [`JobContext`] pairs a [`CancellationToken`] with an optional
//! deadline. Everything working on behalf of one job (submission,
//! polling, the final artifact fetch) watches the same context, so
//! cancelling it unwinds the whole pipeline.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`JobContext`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`JobContext::cancel`] was called on this context or a parent.
    Cancelled,
    /// The deadline passed before the work finished.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("context cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cloneable cancellation scope with an optional deadline.
///
/// Clones share the same token and reason; [`child_with_timeout`]
/// creates a nested scope that is cancelled together with its parent
/// but may expire earlier.
///
/// [`child_with_timeout`]: Self::child_with_timeout
#[derive(Debug, Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    reason: Arc<OnceLock<CancelReason>>,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

impl JobContext {
    /// A context with no deadline. It only ends when cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::new()
        }
    }

    /// Derive a context bounded by both this one and `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            reason: Arc::new(OnceLock::new()),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        let _ = self.reason.set(CancelReason::Cancelled);
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// The reason this context ended, or `None` while it is still live.
    ///
    /// The first reason observed sticks: a context cancelled before its
    /// deadline keeps reporting [`CancelReason::Cancelled`] afterwards.
    pub fn cause(&self) -> Option<CancelReason> {
        if let Some(reason) = self.reason.get() {
            return Some(*reason);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::DeadlineExceeded);
        }
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        None
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        let _ = self.reason.set(CancelReason::DeadlineExceeded);
                    }
                }
            }
            None => self.token.cancelled().await,
        }
        self.cause().unwrap_or(CancelReason::Cancelled)
    }

    /// Resolve when the deadline passes. Never resolves without one.
    ///
    /// Unlike [`done`](Self::done), explicit cancellation does not wake
    /// this future.
    pub async fn deadline_elapsed(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
