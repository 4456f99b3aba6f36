//! Error types for the durable event log.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while creating, writing or reading an event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The log file could not be created.
    #[error("failed to create event log file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The log file could not be opened for reading.
    #[error("failed to open event log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or reading the underlying storage failed.
    #[error("event log I/O error: {0}")]
    Io(#[from] io::Error),

    /// A row could not be turned back into an event.
    #[error("invalid event log row at line {line}: {message}")]
    InvalidRow { line: usize, message: String },
}

impl EventLogError {
    pub(crate) fn invalid_row(line: usize, message: impl ToString) -> Self {
        Self::InvalidRow {
            line,
            message: message.to_string(),
        }
    }
}
