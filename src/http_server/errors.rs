//! # HTTP Errors
//!
//! Maps lookup failures to status codes. Bodies are plain text. Unexpected
//! storage failures are logged here and answered with a generic message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::bigtable::BigtableError;
use crate::errors::LookupError;

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Invalid request body or parameters
    #[error("{0}")]
    BadRequest(String),

    /// Table, row, cell or instance absent
    #[error("{0}")]
    NotFound(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Detail stays in the server log
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound("NOT FOUND".to_string())
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::InstanceNotFound(id) => {
                ApiError::NotFound(format!("Instance not found: {}", id))
            }
            LookupError::Validation(msg) => ApiError::BadRequest(msg),
            LookupError::Client(BigtableError::InvalidArgument(msg)) => ApiError::BadRequest(msg),
            LookupError::Client(e) => ApiError::Internal(e.to_string()),
        }
    }
}

// Malformed bodies and query strings are caller errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let status = self.status_code();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_lookup_error_mapping() {
        let err = ApiError::from(LookupError::InstanceNotFound("i9".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("i9"));

        let err = ApiError::from(LookupError::validation("tableList must not be empty"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = ApiError::from(LookupError::Client(BigtableError::Transport(
            "10.0.0.7:443 connection reset".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_invalid_argument_is_bad_request() {
        let err = ApiError::from(LookupError::Client(BigtableError::InvalidArgument(
            "invalid table id 'a b'".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "invalid table id 'a b'");
    }
}
