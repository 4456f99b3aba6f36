//! Byte pumps shared by the engines.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::RELAY_BUFFER_SIZE;
use crate::fanout::ConnectionEvents;
use crate::shutdown::Shutdown;
use crate::stats::EngineStats;

/// Which way bytes are flowing, relative to the side that initiated the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the initiating side.
    Outbound,
    /// Towards the initiating side.
    Inbound,
}

/// How a pump or connection ended.
#[derive(Debug)]
pub enum Termination {
    /// The reader reached end of stream.
    Closed,
    /// Cancellation was requested.
    Cancelled,
    /// A read or write failed.
    Failed(io::Error),
}

impl Termination {
    pub fn is_closed(&self) -> bool {
        matches!(self, Termination::Closed)
    }
}

/// Copies `reader` into `writer` until end of stream, failure or
/// cancellation, publishing a data event per read.
///
/// On end of stream the writer is shut down so the peer sees the half-close.
pub(crate) async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    direction: Direction,
    events: &ConnectionEvents,
    stats: &EngineStats,
    shutdown: &mut Shutdown,
) -> Termination
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = tokio::select! {
            biased;
            _ = shutdown.requested() => return Termination::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    // The peer may already be gone; nothing more to report.
                    let _ = writer.shutdown().await;
                    return Termination::Closed;
                }
                Ok(n) => n,
                Err(e) => return Termination::Failed(e),
            },
        };

        events.data(direction, &buf[..n]);
        stats.record_bytes(direction, n);

        tokio::select! {
            biased;
            _ = shutdown.requested() => return Termination::Cancelled,
            written = writer.write_all(&buf[..n]) => {
                if let Err(e) = written {
                    return Termination::Failed(e);
                }
            }
        }
    }
}

/// Relays both directions between `client` and `destination`.
///
/// When either direction ends, the other one is stopped too. After end of
/// stream the remaining direction gets up to `half_close_timeout` to
/// deliver what is still in flight; a failure or cancellation stops it
/// immediately.
pub(crate) async fn relay_bidirectional(
    client: &mut TcpStream,
    destination: &mut TcpStream,
    events: &ConnectionEvents,
    stats: &EngineStats,
    shutdown: &Shutdown,
    half_close_timeout: Duration,
) -> Termination {
    let (mut client_read, mut client_write) = client.split();
    let (mut dest_read, mut dest_write) = destination.split();

    let mut outbound_shutdown = shutdown.clone();
    let mut inbound_shutdown = shutdown.clone();

    let outbound = pump(
        &mut client_read,
        &mut dest_write,
        Direction::Outbound,
        events,
        stats,
        &mut outbound_shutdown,
    );
    let inbound = pump(
        &mut dest_read,
        &mut client_write,
        Direction::Inbound,
        events,
        stats,
        &mut inbound_shutdown,
    );
    tokio::pin!(outbound);
    tokio::pin!(inbound);

    let (termination, ended) = tokio::select! {
        t = &mut outbound => (t, Direction::Outbound),
        t = &mut inbound => (t, Direction::Inbound),
    };
    if !termination.is_closed() {
        return termination;
    }

    let remaining = async {
        match ended {
            Direction::Outbound => (&mut inbound).await,
            Direction::Inbound => (&mut outbound).await,
        }
    };
    match tokio::time::timeout(half_close_timeout, remaining).await {
        Ok(termination) => termination,
        Err(_) => {
            debug!(?ended, "Half-closed connection timed out");
            Termination::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::EventFanout;
    use netutil_events::{ChannelSink, Endpoints, TcpEventType};
    use netutil_id::ConnectionId;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use tokio::net::TcpListener;
    use tokio::sync::watch;

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
        }
    }

    fn recording_events() -> (ConnectionEvents, tokio::sync::mpsc::UnboundedReceiver<netutil_events::TcpEvent>) {
        let (sink, rx) = ChannelSink::channel();
        let fanout = Arc::new(EventFanout::new(Some(Arc::new(sink)), None, true));
        let events = ConnectionEvents::connect(
            ConnectionId::FIRST,
            Endpoints::new("local", "remote"),
            fanout,
        );
        (events, rx)
    }

    #[tokio::test]
    async fn test_pump_copies_until_eof() {
        let (events, mut rx) = recording_events();
        let stats = EngineStats::default();
        let (_tx, stop_rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(stop_rx);

        let (mut near, mut far) = tokio::io::duplex(64);
        far.write_all(b"hello relay").await.unwrap();
        drop(far);

        let mut out = Vec::new();
        let termination = pump(
            &mut near,
            &mut out,
            Direction::Outbound,
            &events,
            &stats,
            &mut shutdown,
        )
        .await;

        assert!(termination.is_closed());
        assert_eq!(out, b"hello relay");
        assert_eq!(stats.snapshot().bytes_outbound, 11);

        assert_eq!(rx.try_recv().unwrap().kind(), TcpEventType::Connected);
        let mut copied = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.kind(), TcpEventType::OutboundData);
            copied.extend_from_slice(event.payload().unwrap());
        }
        assert_eq!(copied, b"hello relay");
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let (events, _rx) = recording_events();
        let stats = EngineStats::default();
        let (tx, stop_rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(stop_rx);

        let (mut near, _far) = tokio::io::duplex(64);
        let mut out = tokio::io::sink();

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });

        let termination = tokio::time::timeout(
            Duration::from_secs(1),
            pump(
                &mut near,
                &mut out,
                Direction::Inbound,
                &events,
                &stats,
                &mut shutdown,
            ),
        )
        .await
        .unwrap();
        assert!(matches!(termination, Termination::Cancelled));
        drop(cancel.await.unwrap());
    }

    #[tokio::test]
    async fn test_pump_reports_read_failure() {
        let (events, _rx) = recording_events();
        let stats = EngineStats::default();
        let (_tx, stop_rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(stop_rx);

        let mut out = Vec::new();
        let termination = pump(
            &mut FailingReader,
            &mut out,
            Direction::Outbound,
            &events,
            &stats,
            &mut shutdown,
        )
        .await;
        match termination {
            Termination::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected termination: {other:?}"),
        }
    }

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (connected.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_relay_ends_half_closed_connection_after_timeout() {
        let (events, _rx) = recording_events();
        let stats = EngineStats::default();
        let (_tx, stop_rx) = watch::channel(false);
        let shutdown = Shutdown::new(stop_rx);

        let (mut client_peer, mut client) = tcp_pair().await;
        let (mut destination, mut destination_peer) = tcp_pair().await;

        client_peer.write_all(b"bye").await.unwrap();
        client_peer.shutdown().await.unwrap();

        // The destination never answers and never closes.
        let termination = tokio::time::timeout(
            Duration::from_secs(2),
            relay_bidirectional(
                &mut client,
                &mut destination,
                &events,
                &stats,
                &shutdown,
                Duration::from_millis(100),
            ),
        )
        .await
        .unwrap();
        assert!(termination.is_closed());

        let mut forwarded = [0u8; 3];
        destination_peer.read_exact(&mut forwarded).await.unwrap();
        assert_eq!(&forwarded, b"bye");
    }

    #[tokio::test]
    async fn test_relay_drains_remaining_direction_before_timeout() {
        let (events, _rx) = recording_events();
        let stats = EngineStats::default();
        let (_tx, stop_rx) = watch::channel(false);
        let shutdown = Shutdown::new(stop_rx);

        let (mut client_peer, mut client) = tcp_pair().await;
        let (mut destination, mut destination_peer) = tcp_pair().await;

        client_peer.write_all(b"ping").await.unwrap();
        client_peer.shutdown().await.unwrap();

        let responder = tokio::spawn(async move {
            let mut request = Vec::new();
            destination_peer.read_to_end(&mut request).await.unwrap();
            destination_peer.write_all(b"pong").await.unwrap();
            destination_peer.shutdown().await.unwrap();
            request
        });

        let termination = relay_bidirectional(
            &mut client,
            &mut destination,
            &events,
            &stats,
            &shutdown,
            Duration::from_secs(5),
        )
        .await;
        assert!(termination.is_closed());
        assert_eq!(responder.await.unwrap(), b"ping");

        let mut reply = Vec::new();
        client_peer.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"pong");
        assert_eq!(stats.snapshot().bytes_inbound, 4);
    }
}
