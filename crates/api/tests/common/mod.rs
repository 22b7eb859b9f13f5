//! Shared test helpers: the fake generation gateway, a test app wired
//! to it, and SSE body parsing.

#![allow(dead_code)]

#[path = "../../../comfyui/tests/common/gateway.rs"]
mod gateway;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Router;
use comfybridge_api::config::ServerConfig;
use comfybridge_api::router::build_app_router;
use comfybridge_api::state::AppState;
use comfybridge_comfyui::config::ComfyUIConfig;
use comfybridge_comfyui::retry::RetryConfig;
use comfybridge_comfyui::ComfyUIClient;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;

pub use gateway::{sample_job, spawn_gateway, FakeGateway, Reply};

/// Server config pointed at `gateway_url`, with fast retries and polling.
pub fn test_config(gateway_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        generation_timeout_secs: 10,
        result_fetch_timeout_secs: 2,
        comfyui: ComfyUIConfig {
            host: gateway_url.to_string(),
            request_timeout: Duration::from_secs(5),
            retry: RetryConfig {
                attempts: 3,
                backoff_unit: Duration::from_millis(20),
            },
            poll_interval: POLL_INTERVAL,
        },
    }
}

pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A gateway client built from [`test_config`].
pub fn test_client(gateway_url: &str) -> Arc<ComfyUIClient> {
    Arc::new(ComfyUIClient::new(&test_config(gateway_url).comfyui).unwrap())
}

/// Build the full application router against `gateway_url`.
pub fn build_test_app(gateway_url: &str) -> Router {
    build_app_with(test_config(gateway_url))
}

/// Build the full application router from an explicit configuration.
pub fn build_app_with(config: ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        comfyui: Arc::new(ComfyUIClient::new(&config.comfyui).unwrap()),
    };
    build_app_router(state, &config)
}

/// One decoded SSE frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub event: String,
    pub data: Value,
}

/// Split a raw event-stream body into frames.
pub fn parse_frames(raw: &[u8]) -> Vec<Frame> {
    let text = std::str::from_utf8(raw).expect("event stream is UTF-8");
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event = Some(rest.to_string());
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = Some(serde_json::from_str(rest).expect("data line is JSON"));
                }
            }
            Frame {
                event: event.expect("frame has an event line"),
                data: data.expect("frame has a data line"),
            }
        })
        .collect()
}

/// Render events through a real SSE body and split them into frames.
pub async fn render_frames(events: Vec<Event>) -> Vec<Frame> {
    let stream = tokio_stream::iter(events.into_iter().map(Ok::<_, Infallible>));
    let body = Sse::new(stream).into_response().into_body();
    let raw = body.collect().await.unwrap().to_bytes();
    parse_frames(&raw)
}

/// Drain a frame receiver until the writer side is dropped.
pub async fn drain_frames(rx: &mut mpsc::Receiver<Event>) -> Vec<Frame> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    render_frames(events).await
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
