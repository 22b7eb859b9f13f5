//! ComfyUI bridge API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! the streaming bridge) so integration tests and the binary entrypoint
//! can both access them.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
