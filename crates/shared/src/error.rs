use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback shown when a failure carries no backend message.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Error body returned by the prediction backend alongside a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// Extracts the `error` field from a raw response body, ignoring blank messages.
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<ApiError>(body)
            .ok()
            .filter(|parsed| !parsed.error.trim().is_empty())
    }
}
