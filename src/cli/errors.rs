//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::fmt;

use crate::config::ConfigError;
use crate::errors::LookupError;
use crate::registry::RegistryError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or environment error
    ConfigError,
    /// Client registry could not be built
    BootFailed,
    /// HTTP server stopped with an error
    ServeFailed,
    /// A one-shot operation failed
    OperationFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "KVLOOKUP_CLI_CONFIG_ERROR",
            Self::BootFailed => "KVLOOKUP_CLI_BOOT_FAILED",
            Self::ServeFailed => "KVLOOKUP_CLI_SERVE_FAILED",
            Self::OperationFailed => "KVLOOKUP_CLI_OPERATION_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn serve_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ServeFailed, msg)
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::OperationFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        Self::boot_failed(e.to_string())
    }
}

impl From<LookupError> for CliError {
    fn from(e: LookupError) -> Self {
        Self::operation_failed(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::from(RegistryError::NoInstances);
        assert_eq!(err.code(), &CliErrorCode::BootFailed);
        assert_eq!(
            err.to_string(),
            "KVLOOKUP_CLI_BOOT_FAILED: at least one instance id is required"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err = CliError::from(ConfigError::Invalid("project_id is required".to_string()));
        assert_eq!(err.code().code(), "KVLOOKUP_CLI_CONFIG_ERROR");
        assert!(err.message().contains("project_id"));
    }
}
