//! ComfyUI generation gateway client.
//!
//! Provides typed wire messages, an HTTP API wrapper, linear-backoff
//! submission retries, and a cancellable background poll loop that
//! turns status responses into an ordered stream of progress events.

pub mod api;
pub mod client;
pub mod config;
pub mod messages;
pub mod poller;
pub mod retry;

pub use client::{ComfyUIClient, ComfyUIClientError};
pub use poller::JobWatch;
