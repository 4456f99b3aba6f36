//! Connection events.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use netutil_id::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::EventError;

/// What happened on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TcpEventType {
    /// The connection was established.
    Connected,
    /// Bytes travelled from the source side towards the destination side.
    OutboundData,
    /// Bytes travelled from the destination side back to the source side.
    InboundData,
    /// The connection ended without a failure.
    Disconnected,
    /// The connection failed; the payload holds the error message.
    Error,
}

impl TcpEventType {
    /// All event types, in declaration order.
    pub const ALL: [TcpEventType; 5] = [
        TcpEventType::Connected,
        TcpEventType::OutboundData,
        TcpEventType::InboundData,
        TcpEventType::Disconnected,
        TcpEventType::Error,
    ];

    /// Stable name used in logs and durable rows.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TcpEventType::Connected => "Connected",
            TcpEventType::OutboundData => "OutboundData",
            TcpEventType::InboundData => "InboundData",
            TcpEventType::Disconnected => "Disconnected",
            TcpEventType::Error => "Error",
        }
    }

    /// Returns true for the two data-bearing event types.
    pub const fn is_data(&self) -> bool {
        matches!(self, TcpEventType::OutboundData | TcpEventType::InboundData)
    }

    /// Returns true for events that end a connection.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TcpEventType::Disconnected | TcpEventType::Error)
    }
}

impl std::fmt::Display for TcpEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TcpEventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TcpEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EventError::UnknownEventType(s.to_string()))
    }
}

/// The pair of endpoint descriptions attached to every event of a connection.
///
/// Resolved once when the connection is established and shared by all of its
/// events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    source: Arc<str>,
    destination: Arc<str>,
}

impl Endpoints {
    pub fn new(source: impl Into<Arc<str>>, destination: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// One observable occurrence on a connection.
///
/// Constructed through the per-type constructors, which enforce the payload
/// invariant: `Connected` and `Disconnected` carry no payload, data events
/// carry a private copy of the bytes, `Error` carries the UTF-8 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEvent {
    kind: TcpEventType,
    endpoints: Endpoints,
    connection_id: ConnectionId,
    timestamp: DateTime<Utc>,
    payload: Option<Bytes>,
}

impl TcpEvent {
    /// A `Connected` event stamped now.
    pub fn connected(connection_id: ConnectionId, endpoints: &Endpoints) -> Self {
        Self::build(TcpEventType::Connected, connection_id, endpoints, None)
    }

    /// A `Disconnected` event stamped now.
    pub fn disconnected(connection_id: ConnectionId, endpoints: &Endpoints) -> Self {
        Self::build(TcpEventType::Disconnected, connection_id, endpoints, None)
    }

    /// An `OutboundData` event holding a copy of `data`.
    pub fn outbound(connection_id: ConnectionId, endpoints: &Endpoints, data: &[u8]) -> Self {
        Self::build(
            TcpEventType::OutboundData,
            connection_id,
            endpoints,
            Some(Bytes::copy_from_slice(data)),
        )
    }

    /// An `InboundData` event holding a copy of `data`.
    pub fn inbound(connection_id: ConnectionId, endpoints: &Endpoints, data: &[u8]) -> Self {
        Self::build(
            TcpEventType::InboundData,
            connection_id,
            endpoints,
            Some(Bytes::copy_from_slice(data)),
        )
    }

    /// An `Error` event carrying the message text.
    pub fn error(
        connection_id: ConnectionId,
        endpoints: &Endpoints,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::build(
            TcpEventType::Error,
            connection_id,
            endpoints,
            Some(Bytes::from(message.to_string())),
        )
    }

    fn build(
        kind: TcpEventType,
        connection_id: ConnectionId,
        endpoints: &Endpoints,
        payload: Option<Bytes>,
    ) -> Self {
        Self {
            kind,
            endpoints: endpoints.clone(),
            connection_id,
            timestamp: now_micros(),
            payload,
        }
    }

    pub fn kind(&self) -> TcpEventType {
        self.kind
    }

    pub fn source(&self) -> &str {
        self.endpoints.source()
    }

    pub fn destination(&self) -> &str {
        self.endpoints.destination()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Raw payload bytes, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// The error message of an `Error` event.
    pub fn error_message(&self) -> Option<String> {
        match (self.kind, &self.payload) {
            (TcpEventType::Error, Some(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

/// Current UTC time truncated to microsecond precision.
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn endpoints() -> Endpoints {
        Endpoints::new("127.0.0.1:5000", "127.0.0.1:61000")
    }

    fn id(n: u64) -> ConnectionId {
        ConnectionId::try_from(n).unwrap()
    }

    #[test]
    fn test_connected_has_no_payload() {
        let event = TcpEvent::connected(id(1), &endpoints());
        assert_eq!(event.kind(), TcpEventType::Connected);
        assert!(event.payload().is_none());
        assert_eq!(event.source(), "127.0.0.1:5000");
        assert_eq!(event.destination(), "127.0.0.1:61000");
    }

    #[test]
    fn test_data_payload_is_a_copy() {
        let mut buf = *b"hello";
        let event = TcpEvent::outbound(id(2), &endpoints(), &buf[..3]);
        buf.copy_from_slice(b"XXXXX");
        assert_eq!(event.payload(), Some(&b"hel"[..]));
    }

    #[test]
    fn test_error_payload_is_message() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let event = TcpEvent::error(id(3), &endpoints(), &err);
        assert_eq!(event.payload(), Some(&b"reset by peer"[..]));
        assert_eq!(event.error_message().as_deref(), Some("reset by peer"));
    }

    #[test]
    fn test_timestamp_has_microsecond_precision() {
        let ts = now_micros();
        assert_eq!(ts.nanosecond() % 1_000, 0);
    }

    #[test]
    fn test_event_type_names_roundtrip() {
        for kind in TcpEventType::ALL {
            assert_eq!(kind.as_str().parse::<TcpEventType>().unwrap(), kind);
        }
        assert!(matches!(
            "Closed".parse::<TcpEventType>(),
            Err(EventError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_event_type_classification() {
        assert!(TcpEventType::InboundData.is_data());
        assert!(!TcpEventType::Error.is_data());
        assert!(TcpEventType::Error.is_terminal());
        assert!(TcpEventType::Disconnected.is_terminal());
        assert!(!TcpEventType::Connected.is_terminal());
    }
}
