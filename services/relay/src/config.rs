//! Engine configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use netutil_event_log::EventLogConfig;
use netutil_events::DataFormat;

/// Default maximum concurrent connections per listening engine.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10000;

/// Default timeout for outgoing dials.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a proxied connection may stay half-closed.
pub const DEFAULT_HALF_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Size of the per-direction read buffer.
pub const RELAY_BUFFER_SIZE: usize = 4096;

/// Event reporting options shared by all engines.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    /// Rendering of payloads in the durable log.
    pub format: DataFormat,
    /// Forward data events to the live sink.
    pub display_data: bool,
    /// Durable log destination; `None` disables it.
    pub event_log_file: Option<PathBuf>,
}

impl EventOptions {
    /// Durable log configuration, if a log file was requested.
    pub fn event_log_config(&self) -> Option<EventLogConfig> {
        self.event_log_file
            .as_ref()
            .map(|path| EventLogConfig::new(path, self.format))
    }
}

/// Configuration for the proxy server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Destination every accepted client is relayed to.
    pub connect: SocketAddr,
    pub events: EventOptions,
    /// Timeout for each destination dial.
    pub connect_timeout: Duration,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
    /// How long one direction may keep running after the other reached end
    /// of stream.
    pub half_close_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(bind: SocketAddr, connect: SocketAddr) -> Self {
        Self {
            bind,
            connect,
            events: EventOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            half_close_timeout: DEFAULT_HALF_CLOSE_TIMEOUT,
        }
    }
}

/// Configuration for the echo server.
#[derive(Debug, Clone)]
pub struct EchoConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    pub events: EventOptions,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
}

impl EchoConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            events: EventOptions::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Configuration for the receive client.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Remote address to dial.
    pub connect: SocketAddr,
    pub events: EventOptions,
    pub connect_timeout: Duration,
}

impl ReceiveConfig {
    pub fn new(connect: SocketAddr) -> Self {
        Self {
            connect,
            events: EventOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::new(
            "127.0.0.1:5000".parse().unwrap(),
            "127.0.0.1:6000".parse().unwrap(),
        );
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.half_close_timeout, DEFAULT_HALF_CLOSE_TIMEOUT);
        assert!(!config.events.display_data);
        assert_eq!(config.events.format, DataFormat::Binary);
    }

    #[test]
    fn test_event_log_config_only_when_requested() {
        let mut options = EventOptions::default();
        assert!(options.event_log_config().is_none());

        options.event_log_file = Some(PathBuf::from("session.csv"));
        options.format = DataFormat::Ascii;
        let log = options.event_log_config().unwrap();
        assert_eq!(log.path, PathBuf::from("session.csv"));
        assert_eq!(log.format, DataFormat::Ascii);
    }
}
