//! Environment-variable helpers shared by the per-crate config loaders.
//!
//! Loaders take a lookup function instead of reading `std::env`
//! directly so tests can feed them a plain map.

use std::str::FromStr;

/// A configuration value was present but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{key} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub key: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Read `key` through `lookup`, falling back to `default` when unset or blank.
pub fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError {
                key,
                expected: std::any::type_name::<T>(),
                value: raw,
            })
        }
        _ => Ok(default),
    }
}

/// Read a string value, falling back to `default` when unset or blank.
pub fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
