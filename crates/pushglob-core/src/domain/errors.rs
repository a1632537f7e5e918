//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and malformed names or paths.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative path (escapes its root, or is otherwise malformed)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid space or endpoint name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Invalid external task identifier
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    /// Modification time that is not a finite number
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
