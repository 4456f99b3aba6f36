//! TCP relay engines.
//!
//! Three engines share one event model:
//!
//! - [`ProxyServer`] accepts clients and relays each one to a fixed
//!   destination.
//! - [`EchoServer`] accepts clients and writes back whatever they send.
//! - [`ReceiveClient`] dials a remote once and consumes what it sends.
//!
//! Every connection gets a [`netutil_id::ConnectionId`] and reports its
//! lifecycle as [`netutil_events::TcpEvent`]s through an [`EventFanout`]:
//! to an optional live sink supplied by the caller and to an optional
//! durable CSV log. All engines stop on the same `watch` signal.

pub mod config;
pub mod echo;
pub mod error;
pub mod fanout;
mod listener;
pub mod proxy;
pub mod receive;
pub mod relay;
pub mod shutdown;
pub mod stats;

pub use config::{
    EchoConfig, EventOptions, ProxyConfig, ReceiveConfig, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_HALF_CLOSE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, RELAY_BUFFER_SIZE,
};
pub use echo::EchoServer;
pub use error::RelayError;
pub use fanout::{ConnectionEvents, EventFanout, SharedSink};
pub use proxy::ProxyServer;
pub use receive::ReceiveClient;
pub use relay::{Direction, Termination};
pub use shutdown::Shutdown;
pub use stats::{EngineStats, StatsSnapshot};
