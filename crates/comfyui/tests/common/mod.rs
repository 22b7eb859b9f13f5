//! Shared helpers for the client integration tests.

#![allow(dead_code)]

mod gateway;

use std::time::Duration;

use comfybridge_comfyui::retry::RetryConfig;
use comfybridge_comfyui::ComfyUIClient;

pub use gateway::{sample_job, spawn_gateway, FakeGateway, Reply};

pub const BACKOFF_UNIT: Duration = Duration::from_millis(20);
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A client with fast backoff and polling, pointed at `base_url`.
pub fn fast_client(base_url: &str, attempts: u32) -> ComfyUIClient {
    let api = comfybridge_comfyui::api::ComfyUIApi::new(base_url, Duration::from_secs(5)).unwrap();
    ComfyUIClient::with_api(
        api,
        RetryConfig {
            attempts,
            backoff_unit: BACKOFF_UNIT,
        },
        POLL_INTERVAL,
    )
}
