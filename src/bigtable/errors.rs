//! # Bigtable Client Errors

use thiserror::Error;

/// Result type for Bigtable client calls
pub type BigtableResult<T> = Result<T, BigtableError>;

/// Errors surfaced by Bigtable admin and data handles
#[derive(Debug, Clone, Error)]
pub enum BigtableError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Bigtable returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BigtableError {
    /// Map an HTTP status returned by the Google APIs front end.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            404 => BigtableError::NotFound(message),
            409 => BigtableError::AlreadyExists(message),
            400 => BigtableError::InvalidArgument(message),
            401 | 403 => BigtableError::PermissionDenied(message),
            _ => BigtableError::Status { code, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BigtableError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, BigtableError::AlreadyExists(_))
    }
}

impl From<reqwest::Error> for BigtableError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BigtableError::Decode(e.to_string())
        } else {
            BigtableError::Transport(e.to_string())
        }
    }
}
