//! Shared error types for HarborDB.
//!
//! This module provides common error variants that can be used across all
//! HarborDB crates without introducing external dependencies. The richer
//! taxonomy (provisioning, pool acquisition, query errors) lives in
//! `harbordb-core::error`.

use std::fmt;

/// Common error type for HarborDB operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid input provided to a function
    InvalidInput(String),

    /// Resource not found (project, table, column, etc.)
    NotFound(String),

    /// Resource already exists (duplicate creation)
    AlreadyExists(String),

    /// Configuration error
    ConfigurationError(String),

    /// Internal error (unexpected state)
    Internal(String),
}

impl CommonError {
    /// Creates an InvalidInput error with a message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a NotFound error with a message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates an AlreadyExists error with a message.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Creates a ConfigurationError with a message.
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Creates an Internal error with a message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommonError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CommonError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CommonError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            CommonError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CommonError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CommonError {}

/// Result type alias using CommonError.
pub type Result<T> = std::result::Result<T, CommonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CommonError::invalid_input("bad filter");
        assert!(matches!(err, CommonError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid input: bad filter");

        let err = CommonError::not_found("project_123");
        assert!(matches!(err, CommonError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: project_123");

        let err = CommonError::already_exists("tenant");
        assert!(matches!(err, CommonError::AlreadyExists(_)));
        assert_eq!(err.to_string(), "Already exists: tenant");
    }

    #[test]
    fn test_result_type() {
        fn check(id: &str) -> Result<()> {
            if id.is_empty() {
                return Err(CommonError::invalid_input("id cannot be empty"));
            }
            Ok(())
        }

        assert!(check("p1").is_ok());
        assert!(check("").is_err());
    }
}
