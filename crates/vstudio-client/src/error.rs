//! Client error types.

use serde_json::Value;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Map a non-success HTTP status and its body to an error.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            404 => Self::NotFound(message),
            408 | 429 | 500..=599 => Self::transport(format!("HTTP {}: {}", status, message)),
            _ => Self::Rejected { status, message },
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Network(_))
    }

    /// Errors that will not go away by asking again.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound(_)
                | ClientError::Rejected { .. }
                | ClientError::InvalidRequest(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigError(_)
        )
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::Rejected { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Pull a readable message out of an error envelope.
///
/// Handles `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; anything else is returned verbatim.
pub fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };

    let from_error = value.get("error").and_then(|e| match e {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    });

    from_error
        .or_else(|| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| trimmed.to_string())
}
