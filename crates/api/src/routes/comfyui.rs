use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::comfyui;
use crate::state::AppState;

/// Routes mounted at `/comfyui`.
///
/// `request_timeout` covers the result lookup only; `/generate` is
/// registered after the route layer so it stays outside it.
pub fn router(request_timeout: TimeoutLayer) -> Router<AppState> {
    Router::new()
        .route("/result/{task_id}", get(comfyui::get_result))
        .route_layer(request_timeout)
        .route("/generate", post(comfyui::generate))
}
