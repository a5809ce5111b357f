use reqwest::StatusCode;
use thiserror::Error;

/// Text shown when the backend cannot be reached.
pub const SERVER_UNREACHABLE: &str = "Unable to reach the server. Check that the backend is running.";

/// Failure of a chat operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// No usable response: connection refused, timeout, or unexpected HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Well-formed response with `hasError` set.
    #[error("application error: {message}")]
    Application {
        /// Message attached by the backend, or a generic fallback.
        message: String,
        /// Backend error code, when given.
        code: Option<String>,
    },
    /// Rejected locally before any network call.
    #[error("validation error: {0}")]
    Validation(String),
    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Session persistence or missing authentication.
    #[error("session error: {0}")]
    Session(String),
}

impl ChatError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for an application failure without a code.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            code: None,
        }
    }

    /// Maps a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::NOT_FOUND => "API route not found".to_string(),
            status if status.is_server_error() => format!("Server error ({})", status.as_u16()),
            status => format!("Unexpected HTTP status {}", status.as_u16()),
        };
        Self::Transport(message)
    }

    /// Text suitable for an error banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(detail) if detail.is_empty() => SERVER_UNREACHABLE.to_string(),
            Self::Transport(detail) => format!("{SERVER_UNREACHABLE} ({detail})"),
            Self::Application { message, .. }
            | Self::Validation(message)
            | Self::Session(message) => message.clone(),
            Self::Decode(_) => "Unexpected response from the server".to_string(),
        }
    }

    /// Whether the failure happened before any request was sent.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Session(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        if err.is_timeout() {
            return Self::Transport("request timed out".to_string());
        }
        Self::Transport(String::new())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result of a chat operation.
pub type ChatResult<T> = Result<T, ChatError>;
