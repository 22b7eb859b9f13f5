use std::sync::Arc;

use comfybridge_comfyui::ComfyUIClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Generation gateway client, shared by every stream.
    pub comfyui: Arc<ComfyUIClient>,
}
