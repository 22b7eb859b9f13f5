//! Settings for talking to a ComfyUI gateway.

use std::time::Duration;

use comfybridge_core::config::{parse_or, process_env, string_or, ConfigError};

use crate::retry::RetryConfig;

/// Default gateway address for local development.
pub const DEFAULT_HOST: &str = "http://localhost:8188";

#[derive(Debug, Clone)]
pub struct ComfyUIConfig {
    /// Gateway base URL.
    pub host: String,
    /// Upper bound for each individual HTTP call.
    pub request_timeout: Duration,
    /// Submission attempts and backoff unit.
    pub retry: RetryConfig,
    /// Pause between status polls.
    pub poll_interval: Duration,
}

impl Default for ComfyUIConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl ComfyUIConfig {
    /// Load gateway configuration from environment variables.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `COMFYUI_HOST`             | `http://localhost:8188` |
    /// | `COMFYUI_TIMEOUT_SECS`     | `30`                    |
    /// | `COMFYUI_RETRY_COUNT`      | `3` (at least 1)        |
    /// | `COMFYUI_RETRY_BACKOFF_MS` | `1000`                  |
    /// | `COMFYUI_POLL_INTERVAL_MS` | `1000`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = string_or(lookup, "COMFYUI_HOST", DEFAULT_HOST);
        let timeout_secs: u64 = parse_or(lookup, "COMFYUI_TIMEOUT_SECS", 30)?;
        let attempts: u32 = parse_or(lookup, "COMFYUI_RETRY_COUNT", 3)?;
        let backoff_ms: u64 = parse_or(lookup, "COMFYUI_RETRY_BACKOFF_MS", 1000)?;
        let poll_ms: u64 = parse_or(lookup, "COMFYUI_POLL_INTERVAL_MS", 1000)?;

        Ok(Self {
            host,
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig {
                attempts: attempts.max(1),
                backoff_unit: Duration::from_millis(backoff_ms),
            },
            // A zero period would make `tokio::time::interval` panic.
            poll_interval: Duration::from_millis(poll_ms.max(1)),
        })
    }
}
