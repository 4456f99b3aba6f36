//! Engine errors.
//!
//! Only failures that end a whole engine run are represented here. Failures
//! of a single connection are reported as `Error` events instead.

use std::io;
use std::net::SocketAddr;

use netutil_event_log::EventLogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The one-shot dial of the receive client failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The one-shot dial of the receive client timed out.
    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: SocketAddr },

    /// The durable event log could not be started.
    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
