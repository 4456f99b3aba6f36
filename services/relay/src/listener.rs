//! Accept loop shared by the listening engines.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use netutil_id::{ConnectionId, ConnectionIdGenerator};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::shutdown::Shutdown;
use crate::stats::EngineStats;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Binds a listening socket, mapping failure to [`crate::RelayError::Bind`].
pub(crate) async fn bind(addr: SocketAddr) -> Result<TcpListener, crate::RelayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| crate::RelayError::Bind { addr, source })
}

/// Accepts connections until cancelled, running `handle` for each one.
///
/// Connections over `max_connections` are accepted and closed straight away.
/// Returns once cancellation was requested and every connection task has
/// finished.
pub(crate) async fn accept_loop<F, Fut>(
    listener: &TcpListener,
    max_connections: usize,
    ids: &ConnectionIdGenerator,
    stats: &Arc<EngineStats>,
    shutdown: Shutdown,
    mut handle: F,
) where
    F: FnMut(TcpStream, SocketAddr, ConnectionId, Shutdown) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let limit = Arc::new(Semaphore::new(max_connections.min(Semaphore::MAX_PERMITS)));
    let mut connections = JoinSet::new();
    let mut stop = shutdown.clone();

    if let Ok(local_addr) = listener.local_addr() {
        info!(bind_addr = %local_addr, max_connections, "Listener started");
    }

    loop {
        tokio::select! {
            biased;
            _ = stop.requested() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Connection task failed");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    let permit = match Arc::clone(&limit).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                            warn!(peer_addr = %peer_addr, "Connection rejected: max connections reached");
                            continue;
                        }
                    };

                    let id = ids.next_id();
                    stats.connection_opened();
                    debug!(connection_id = %id, peer_addr = %peer_addr, "Connection accepted");

                    let stats = Arc::clone(stats);
                    let connection = handle(stream, peer_addr, id, shutdown.clone());
                    connections.spawn(
                        async move {
                            connection.await;
                            stats.connection_closed();
                            drop(permit);
                        }
                        .instrument(tracing::info_span!("connection", id = %id, peer = %peer_addr)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
        }
    }

    let remaining = connections.len();
    if remaining > 0 {
        debug!(remaining, "Waiting for connections to finish");
    }
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Connection task failed");
        }
    }
    info!("Listener stopped");
}
