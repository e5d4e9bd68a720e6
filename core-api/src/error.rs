use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credential or expired session.
    Auth,
    /// The request was rejected as invalid; the message is meant for the user.
    Validation,
    /// Network, timeout, unexpected status or malformed body.
    Transport,
    /// Local secure storage failed.
    Storage,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorage(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized { .. } => ErrorKind::Auth,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Timeout(_)
            | ApiError::Network(_)
            | ApiError::Status { .. }
            | ApiError::Decode(_) => ErrorKind::Transport,
            ApiError::SecureStorage(_) => ErrorKind::Storage,
        }
    }

    /// HTTP status carried by the failure, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Validation { message }
            | ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) fn from_bridge(error: BridgeError, timeout: Duration) -> Self {
        match error {
            BridgeError::Timeout(_) => ApiError::Timeout(timeout),
            other => ApiError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
