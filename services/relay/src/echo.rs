//! Echo server: writes every received byte back to its sender.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use netutil_events::Endpoints;
use netutil_id::{ConnectionId, ConnectionIdGenerator};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::EchoConfig;
use crate::fanout::{start_event_pipeline, stop_event_pipeline, ConnectionEvents, EventFanout, SharedSink};
use crate::listener::{accept_loop, bind};
use crate::relay::{pump, Direction};
use crate::shutdown::Shutdown;
use crate::stats::EngineStats;
use crate::RelayError;

/// A bound echo server.
pub struct EchoServer {
    config: EchoConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    live: Option<SharedSink>,
    ids: ConnectionIdGenerator,
    stats: Arc<EngineStats>,
}

impl EchoServer {
    pub async fn bind(config: EchoConfig, live: Option<SharedSink>) -> Result<Self, RelayError> {
        let listener = bind(config.bind).await?;
        let local_addr = listener.local_addr()?;
        info!(bind_addr = %local_addr, "Echo server bound");

        Ok(Self {
            config,
            listener,
            local_addr,
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

    /// Runs until `shutdown` is signalled.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), RelayError> {
        let (fanout, event_log) = start_event_pipeline(&self.config.events, self.live).await?;
        let local = self.local_addr.to_string();

        accept_loop(
            &self.listener,
            self.config.max_connections,
            &self.ids,
            &self.stats,
            Shutdown::new(shutdown),
            |client, peer_addr, id, shutdown| {
                let endpoints = Endpoints::new(local.as_str(), peer_addr.to_string());
                echo_connection(
                    client,
                    id,
                    endpoints,
                    Arc::clone(&fanout),
                    Arc::clone(&self.stats),
                    shutdown,
                )
            },
        )
        .await;

        stop_event_pipeline(fanout, event_log).await;

        let stats = self.stats.snapshot();
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            bytes_echoed = stats.bytes_outbound,
            "Echo server stopped"
        );
        Ok(())
    }
}

async fn echo_connection(
    mut client: TcpStream,
    id: ConnectionId,
    endpoints: Endpoints,
    fanout: Arc<EventFanout>,
    stats: Arc<EngineStats>,
    mut shutdown: Shutdown,
) {
    let events = ConnectionEvents::connect(id, endpoints, fanout);
    let (mut reader, mut writer) = client.split();
    let termination = pump(
        &mut reader,
        &mut writer,
        Direction::Outbound,
        &events,
        &stats,
        &mut shutdown,
    )
    .await;
    debug!(?termination, "Connection finished");
    events.finish(&termination);
}
