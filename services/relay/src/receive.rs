//! Receive client: dials once and consumes everything the remote sends.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use netutil_events::{Endpoints, TcpEvent};
use netutil_id::{ConnectionId, ConnectionIdGenerator};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::config::ReceiveConfig;
use crate::fanout::{start_event_pipeline, stop_event_pipeline, ConnectionEvents, EventFanout, SharedSink};
use crate::relay::{pump, Direction};
use crate::shutdown::Shutdown;
use crate::stats::EngineStats;
use crate::RelayError;

pub struct ReceiveClient {
    config: ReceiveConfig,
    live: Option<SharedSink>,
    ids: ConnectionIdGenerator,
    stats: Arc<EngineStats>,
}

impl ReceiveClient {
    pub fn new(config: ReceiveConfig, live: Option<SharedSink>) -> Self {
        Self {
            config,
            live,
            ids: ConnectionIdGenerator::new(),
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Dials the remote and receives until it closes or `shutdown` is
    /// signalled.
    ///
    /// A failed dial is reported as an `Error` event and returned. Once
    /// connected, the run ends with `Ok` however the connection ends.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), RelayError> {
        let (fanout, event_log) = start_event_pipeline(&self.config.events, self.live.clone()).await?;

        let span = tracing::info_span!("receive", remote = %self.config.connect);
        let result = self
            .receive(&fanout, Shutdown::new(shutdown))
            .instrument(span)
            .await;

        stop_event_pipeline(fanout, event_log).await;
        result
    }

    async fn receive(&self, fanout: &Arc<EventFanout>, mut shutdown: Shutdown) -> Result<(), RelayError> {
        let addr = self.config.connect;
        let id = self.ids.next_id();

        let dialed = tokio::select! {
            biased;
            _ = shutdown.requested() => {
                debug!("Cancelled before connecting");
                return Ok(());
            }
            dialed = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)) => dialed,
        };

        let mut stream = match dialed {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.dial_failed(fanout, id, &source);
                return Err(RelayError::Connect { addr, source });
            }
            Err(_) => {
                self.dial_failed(
                    fanout,
                    id,
                    &io::Error::new(io::ErrorKind::TimedOut, "connect timeout"),
                );
                return Err(RelayError::ConnectTimeout { addr });
            }
        };

        let endpoints = Endpoints::new(
            stream.local_addr()?.to_string(),
            stream.peer_addr()?.to_string(),
        );
        self.stats.connection_opened();
        info!(local = endpoints.source(), "Connected");

        let events = ConnectionEvents::connect(id, endpoints, Arc::clone(fanout));
        let (mut reader, _writer) = stream.split();
        let termination = pump(
            &mut reader,
            &mut tokio::io::sink(),
            Direction::Inbound,
            &events,
            &self.stats,
            &mut shutdown,
        )
        .await;

        self.stats.connection_closed();
        info!(
            ?termination,
            bytes_received = self.stats.bytes_inbound.load(Ordering::Relaxed),
            "Connection finished"
        );
        events.finish(&termination);
        Ok(())
    }

    fn dial_failed(&self, fanout: &EventFanout, id: ConnectionId, error: &io::Error) {
        self.stats.dial_failures.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "Dial failed");
        // No local endpoint exists yet.
        let endpoints = Endpoints::new("", self.config.connect.to_string());
        fanout.publish(TcpEvent::error(id, &endpoints, error));
    }
}
