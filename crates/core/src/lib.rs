//! Shared building blocks for the ComfyUI bridge.
//!
//! Holds the error taxonomy used across crates, env-var config helpers,
//! the [`types::JobHandle`] correlation key, and the cancellable
//! [`context::JobContext`] that governs a single generation job.

pub mod config;
pub mod context;
pub mod error;
pub mod types;
