//! # Lookup Errors
//!
//! Failures of lookup operations. Expected domain results (a table that
//! already exists, a row that is absent) are outcome variants, not errors.

use thiserror::Error;

use crate::bigtable::BigtableError;

/// Result type for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// Request names an instance the registry was not built with
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Request failed validation before reaching storage
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Storage call failed unexpectedly
    #[error("{0}")]
    Client(#[from] BigtableError),
}

impl LookupError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LookupError::Validation(msg.into())
    }
}
