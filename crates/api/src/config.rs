use std::time::Duration;

use comfybridge_comfyui::config::ComfyUIConfig;
use comfybridge_core::config::{parse_or, process_env, string_or, ConfigError};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Time allowed to produce response headers, in seconds (default: `30`).
    /// Streamed bodies are bounded by `generation_timeout_secs` instead.
    pub request_timeout_secs: u64,
    /// Overall deadline for one generation stream, in seconds (default: `600`).
    pub generation_timeout_secs: u64,
    /// Deadline for the artifact fetch after a `complete` event (default: `15`).
    pub result_fetch_timeout_secs: u64,
    /// Generation gateway settings.
    pub comfyui: ComfyUIConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `GENERATION_TIMEOUT_SECS`   | `600`                   |
    /// | `RESULT_FETCH_TIMEOUT_SECS` | `15`                    |
    ///
    /// Gateway variables are documented on [`ComfyUIConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cors_origins = string_or(lookup, "CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: string_or(lookup, "HOST", "0.0.0.0"),
            port: parse_or(lookup, "PORT", 3000)?,
            cors_origins,
            request_timeout_secs: parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            generation_timeout_secs: parse_or(lookup, "GENERATION_TIMEOUT_SECS", 600)?,
            result_fetch_timeout_secs: parse_or(lookup, "RESULT_FETCH_TIMEOUT_SECS", 15)?,
            comfyui: ComfyUIConfig::from_lookup(lookup)?,
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn result_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.result_fetch_timeout_secs)
    }
}
