//! Proxy server: relays every accepted client to a fixed destination.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use netutil_events::{Endpoints, TcpEvent};
use netutil_id::{ConnectionId, ConnectionIdGenerator};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::fanout::{start_event_pipeline, stop_event_pipeline, ConnectionEvents, EventFanout, SharedSink};
use crate::listener::{accept_loop, bind};
use crate::relay::relay_bidirectional;
use crate::shutdown::Shutdown;
use crate::stats::EngineStats;
use crate::RelayError;

/// A bound proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    listener: TcpListener,
    live: Option<SharedSink>,
    ids: ConnectionIdGenerator,
    stats: Arc<EngineStats>,
}

impl ProxyServer {
    /// Binds the listening socket. Events go to `live` (if any) and to the
    /// durable log configured in `config.events`.
    pub async fn bind(config: ProxyConfig, live: Option<SharedSink>) -> Result<Self, RelayError> {
        let listener = bind(config.bind).await?;
        info!(
            bind_addr = %listener.local_addr()?,
            destination = %config.connect,
            "Proxy server bound"
        );

        Ok(Self {
            config,
            listener,
            live,
            ids: ConnectionIdGenerator::new(),
            stats: Arc::new(EngineStats::default()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until `shutdown` is signalled, then waits for every connection
    /// and the durable log to finish.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), RelayError> {
        let local = self.listener.local_addr()?.to_string();
        let (fanout, event_log) = start_event_pipeline(&self.config.events, self.live).await?;

        let dialer = Arc::new(Dialer {
            local,
            destination: self.config.connect,
            connect_timeout: self.config.connect_timeout,
            half_close_timeout: self.config.half_close_timeout,
            fanout: Arc::clone(&fanout),
            stats: Arc::clone(&self.stats),
        });

        accept_loop(
            &self.listener,
            self.config.max_connections,
            &self.ids,
            &self.stats,
            Shutdown::new(shutdown),
            |client, peer_addr, id, shutdown| {
                let dialer = Arc::clone(&dialer);
                async move { dialer.handle_connection(client, peer_addr, id, shutdown).await }
            },
        )
        .await;

        drop(dialer);
        stop_event_pipeline(fanout, event_log).await;

        let stats = self.stats.snapshot();
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            dial_failures = stats.dial_failures,
            bytes_outbound = stats.bytes_outbound,
            bytes_inbound = stats.bytes_inbound,
            "Proxy server stopped"
        );
        Ok(())
    }
}

struct Dialer {
    /// Listener address, reported as every event's source.
    local: String,
    destination: SocketAddr,
    connect_timeout: Duration,
    half_close_timeout: Duration,
    fanout: Arc<EventFanout>,
    stats: Arc<EngineStats>,
}

impl Dialer {
    async fn handle_connection(
        &self,
        mut client: TcpStream,
        peer_addr: SocketAddr,
        id: ConnectionId,
        mut shutdown: Shutdown,
    ) {
        let dialed = tokio::select! {
            biased;
            _ = shutdown.requested() => return,
            dialed = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.destination)) => dialed,
        };

        let mut destination = match dialed {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.dial_failed(id, peer_addr, e),
            Err(_) => {
                return self.dial_failed(
                    id,
                    peer_addr,
                    io::Error::new(io::ErrorKind::TimedOut, "connect timeout"),
                )
            }
        };

        let destination_addr = destination
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.destination.to_string());
        debug!(destination = %destination_addr, "Connected to destination");

        let events = ConnectionEvents::connect(
            id,
            Endpoints::new(self.local.as_str(), destination_addr),
            Arc::clone(&self.fanout),
        );
        let termination = relay_bidirectional(
            &mut client,
            &mut destination,
            &events,
            &self.stats,
            &shutdown,
            self.half_close_timeout,
        )
        .await;
        debug!(?termination, "Connection finished");
        events.finish(&termination);
    }

    fn dial_failed(&self, id: ConnectionId, peer_addr: SocketAddr, error: io::Error) {
        self.stats.dial_failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            peer_addr = %peer_addr,
            destination = %self.destination,
            error = %error,
            "Destination dial failed"
        );
        let endpoints = Endpoints::new(self.local.as_str(), self.destination.to_string());
        self.fanout.publish(TcpEvent::error(id, &endpoints, &error));
    }
}
