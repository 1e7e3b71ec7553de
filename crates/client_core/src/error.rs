use shared::error::GENERIC_ERROR_MESSAGE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {}", .message.as_deref().unwrap_or(GENERIC_ERROR_MESSAGE))]
    Backend {
        status: u16,
        message: Option<String>,
    },
    #[error("malformed response from {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("{0}")]
    Validation(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Text suitable for a transient user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Backend {
                message: Some(message),
                ..
            } => message.clone(),
            ClientError::Validation(message) => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
