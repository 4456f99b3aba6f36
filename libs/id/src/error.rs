//! Error types for ID parsing.

use thiserror::Error;

/// Errors that can occur when parsing a connection ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID is not a base-10 unsigned integer.
    #[error("invalid connection ID '{0}': expected a positive integer")]
    NotANumber(String),

    /// Zero is never assigned.
    #[error("connection ID must be positive")]
    Zero,
}
