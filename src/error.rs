//! Error types for the payssion library

use http::StatusCode;
use thiserror::Error;

/// Result type alias for payssion operations
pub type Result<T> = std::result::Result<T, PayssionError>;

/// Boxed error returned by caller-supplied notification handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for payssion operations
#[derive(Error, Debug)]
pub enum PayssionError {
    /// Caller passed an empty or otherwise unusable argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Network or connection failure talking to the gateway
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a body that is not the expected JSON
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Inbound notification is missing required keys or cannot be parsed
    #[error("Malformed notification: {message}")]
    MalformedNotification { message: String },

    /// Inbound notification signature does not match
    #[error("Unauthorized: notification signature mismatch")]
    Unauthorized,

    /// The caller's notification handler failed after a successful verification
    #[error("Notification handler failed: {0}")]
    Handler(#[source] BoxError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PayssionError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a malformed notification error
    pub fn malformed_notification(message: impl Into<String>) -> Self {
        Self::MalformedNotification {
            message: message.into(),
        }
    }

    /// Wrap a handler failure
    pub fn handler(error: impl Into<BoxError>) -> Self {
        Self::Handler(error.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status a notification endpoint answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } | Self::MalformedNotification { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for a signature mismatch on an inbound notification.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
