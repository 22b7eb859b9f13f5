//! Identifier types shared between the client and the HTTP layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Opaque identifier assigned by the generation service on submission.
///
/// Every status poll and result fetch for a job is keyed by its handle.
/// Handles are never empty; any other content is passed through as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobHandle(String);

impl JobHandle {
    /// Validate and wrap a raw handle string.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("job handle must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobHandle {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobHandle> for String {
    fn from(handle: JobHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
