//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when parsing event fields from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event type name is unknown.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The data format name is unknown.
    #[error("unknown data format '{0}' (expected binary, ascii or utf8)")]
    UnknownFormat(String),

    /// The timestamp could not be parsed.
    #[error("invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },
}
