//! REST API client for the ComfyUI generation gateway.
//!
//! Wraps the three gateway endpoints (workflow submission, status
//! polling, result retrieval) using [`reqwest`]. Each call is a single
//! request; retry policy lives in [`crate::retry`].

use std::time::Duration;

use comfybridge_core::types::JobHandle;

use crate::messages::{ProgressEvent, ResultArtifact, SubmitResponse};

/// HTTP client for a single ComfyUI gateway.
#[derive(Debug)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    base: reqwest::Url,
    api_url: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout) or
    /// the body could not be decoded.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The configured gateway address is not a usable base URL.
    #[error("Invalid ComfyUI URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ComfyUIApiError {
    /// Whether a submission that failed this way is worth repeating.
    ///
    /// Transport failures and non-success statuses are; a success
    /// response whose body does not decode is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ComfyUIApiError::Request(e) => !e.is_decode(),
            ComfyUIApiError::ApiError { .. } => true,
            ComfyUIApiError::InvalidUrl { .. } => false,
        }
    }
}

impl ComfyUIApi {
    /// Create a new API client for a gateway.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    /// * `timeout` - Upper bound for each individual request.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ComfyUIApiError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let invalid = |reason: String| ComfyUIApiError::InvalidUrl {
            url: api_url.clone(),
            reason,
        };
        let base = reqwest::Url::parse(&api_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            api_url,
        })
    }

    /// Base HTTP URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a serialized workflow for execution.
    ///
    /// Sends `POST /api/submit-workflow` with the pre-encoded JSON body
    /// and returns the gateway-assigned task handle.
    pub async fn submit_workflow(&self, payload: &[u8]) -> Result<SubmitResponse, ComfyUIApiError> {
        let response = self
            .client
            .post(self.endpoint(&["api", "submit-workflow"])?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status of a job via `GET /api/status/{task_id}`.
    pub async fn get_status(&self, handle: &JobHandle) -> Result<ProgressEvent, ComfyUIApiError> {
        let response = self
            .client
            .get(self.endpoint(&["api", "status", handle.as_str()])?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the final artifact of a job via `GET /api/result/{task_id}`.
    pub async fn get_result(&self, handle: &JobHandle) -> Result<ResultArtifact, ComfyUIApiError> {
        let response = self
            .client
            .get(self.endpoint(&["api", "result", handle.as_str()])?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Append path segments to the base URL, percent-encoding each one,
    /// so a handle is always exactly one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ComfyUIApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ComfyUIApiError::InvalidUrl {
                url: self.api_url.clone(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
