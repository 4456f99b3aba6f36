//! # netutil-id
//!
//! Connection identifiers for the netutil engines.
//!
//! ## Design Principles
//!
//! - A connection ID is a positive integer, unique within one engine run
//! - IDs are assigned in acceptance/dial order from a counter owned by the engine
//! - IDs are opaque correlation keys; gaps are allowed, reuse is not
//!
//! ## Example
//!
//! ```
//! use netutil_id::ConnectionIdGenerator;
//!
//! let ids = ConnectionIdGenerator::new();
//! assert_eq!(ids.next_id().value(), 1);
//! assert_eq!(ids.next_id().value(), 2);
//! ```

mod error;
mod types;

pub use error::IdError;
pub use types::*;
