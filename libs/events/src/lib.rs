//! # netutil-events
//!
//! Event model and delivery primitives shared by the netutil engines.
//!
//! ## Design Principles
//!
//! - Events are immutable records of one observable occurrence on a connection
//! - Every event owns its payload; nothing aliases a socket receive buffer
//! - Sinks never block the publishing connection handler
//!
//! ## Event Types
//!
//! - `Connected` / `Disconnected` bracket a connection's lifetime
//! - `OutboundData` / `InboundData` carry relayed bytes
//! - `Error` carries the failure message as UTF-8 bytes

mod error;
mod event;
mod format;
mod sink;

pub use error::EventError;
pub use event::*;
pub use format::*;
pub use sink::*;
