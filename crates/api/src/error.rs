use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use comfybridge_comfyui::api::ComfyUIApiError;
use comfybridge_comfyui::ComfyUIClientError;
use comfybridge_core::context::CancelReason;
use comfybridge_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`ComfyUIClientError`] for
/// gateway failures. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `comfybridge_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The generation gateway failed or could not be reached.
    #[error(transparent)]
    Upstream(#[from] ComfyUIClientError),

    /// A request body that could not be read as a workflow document.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }

            // --- Gateway errors ---
            AppError::Upstream(err) => classify_upstream_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a gateway client error into an HTTP status, error code, and message.
///
/// - A 404 from the gateway maps to 404.
/// - A passed deadline maps to 504.
/// - Serialization failures are ours and map to 500.
/// - Everything else is a failed upstream dependency and maps to 502.
fn classify_upstream_error(err: &ComfyUIClientError) -> (StatusCode, &'static str, String) {
    match err {
        ComfyUIClientError::Api(ComfyUIApiError::ApiError { status: 404, .. }) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Task not found on the generation service".to_string(),
        ),
        ComfyUIClientError::Cancelled(CancelReason::DeadlineExceeded) => (
            StatusCode::GATEWAY_TIMEOUT,
            "UPSTREAM_TIMEOUT",
            err.to_string(),
        ),
        ComfyUIClientError::Cancelled(CancelReason::Cancelled) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "CANCELLED",
            err.to_string(),
        ),
        ComfyUIClientError::Serialize(e) => {
            tracing::error!(error = %e, "Failed to encode workflow payload");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        ComfyUIClientError::SubmitExhausted { .. } | ComfyUIClientError::Api(_) => {
            tracing::error!(error = %err, "Generation gateway error");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
    }
}
