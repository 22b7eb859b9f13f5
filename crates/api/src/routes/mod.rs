pub mod comfyui;
pub mod health;

use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /comfyui/generate                                submit + SSE progress (POST)
/// /comfyui/result/{task_id}                        final artifact (GET)
/// ```
pub fn api_routes(request_timeout: TimeoutLayer) -> Router<AppState> {
    Router::new().nest("/comfyui", comfyui::router(request_timeout))
}
