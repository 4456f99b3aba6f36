//! Flattened projection of an event onto one log row.

use chrono::{DateTime, Utc};
use netutil_events::{format_log_timestamp, parse_log_timestamp, DataFormat, TcpEvent, TcpEventType};
use netutil_id::ConnectionId;

use crate::EventLogError;

/// Column names of the header row.
pub const HEADER: [&str; 6] = [
    "Timestamp",
    "Connection ID",
    "End Point 1",
    "End Point 2",
    "Type",
    "Data",
];

/// One durable log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub timestamp: DateTime<Utc>,
    pub connection_id: ConnectionId,
    pub source: String,
    pub destination: String,
    pub kind: TcpEventType,
    /// Payload rendered in the log's data format; error messages are kept as
    /// plain text whatever the format.
    pub data: String,
}

impl EventRow {
    pub fn from_event(event: &TcpEvent, format: DataFormat) -> Self {
        let data = match event.kind() {
            TcpEventType::Error => event.error_message().unwrap_or_default(),
            _ => event
                .payload()
                .map(|bytes| format.render(bytes))
                .unwrap_or_default(),
        };

        Self {
            timestamp: event.timestamp(),
            connection_id: event.connection_id(),
            source: event.source().to_string(),
            destination: event.destination().to_string(),
            kind: event.kind(),
            data,
        }
    }

    /// Column values in header order.
    pub fn to_fields(&self) -> [String; 6] {
        [
            format_log_timestamp(&self.timestamp),
            self.connection_id.to_string(),
            self.source.clone(),
            self.destination.clone(),
            self.kind.to_string(),
            self.data.clone(),
        ]
    }

    /// Parses a row read back from a log; `line` is used for error context.
    pub fn from_fields(fields: &[String], line: usize) -> Result<Self, EventLogError> {
        let [timestamp, connection_id, source, destination, kind, data] = fields else {
            return Err(EventLogError::invalid_row(
                line,
                format!("expected {} columns, found {}", HEADER.len(), fields.len()),
            ));
        };

        Ok(Self {
            timestamp: parse_log_timestamp(timestamp)
                .map_err(|e| EventLogError::invalid_row(line, e))?,
            connection_id: connection_id
                .parse()
                .map_err(|e| EventLogError::invalid_row(line, e))?,
            source: source.clone(),
            destination: destination.clone(),
            kind: kind
                .parse()
                .map_err(|e| EventLogError::invalid_row(line, e))?,
            data: data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netutil_events::Endpoints;

    fn endpoints() -> Endpoints {
        Endpoints::new("127.0.0.1:5000", "10.0.0.2:80")
    }

    #[test]
    fn test_data_row_uses_format() {
        let event = TcpEvent::inbound(ConnectionId::FIRST, &endpoints(), &[0x41, 0x01, 0x42]);
        let row = EventRow::from_event(&event, DataFormat::Ascii);
        assert_eq!(row.data, "A[01]B");
        assert_eq!(row.kind, TcpEventType::InboundData);

        let fields = row.to_fields();
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2], "127.0.0.1:5000");
        assert_eq!(fields[3], "10.0.0.2:80");
        assert_eq!(fields[4], "InboundData");
        assert_eq!(fields[5], "A[01]B");
    }

    #[test]
    fn test_error_row_keeps_message_text() {
        let event = TcpEvent::error(ConnectionId::FIRST, &endpoints(), "connection refused");
        let row = EventRow::from_event(&event, DataFormat::Binary);
        assert_eq!(row.data, "connection refused");
    }

    #[test]
    fn test_lifecycle_row_has_empty_data() {
        let event = TcpEvent::connected(ConnectionId::FIRST, &endpoints());
        assert_eq!(EventRow::from_event(&event, DataFormat::Utf8).data, "");
    }

    #[test]
    fn test_fields_roundtrip_at_millisecond_precision() {
        let event = TcpEvent::outbound(ConnectionId::FIRST, &endpoints(), b"hi");
        let row = EventRow::from_event(&event, DataFormat::Utf8);
        let fields = row.to_fields().to_vec();
        let parsed = EventRow::from_fields(&fields, 2).unwrap();

        assert_eq!(parsed.connection_id, row.connection_id);
        assert_eq!(parsed.kind, row.kind);
        assert_eq!(parsed.data, "hi");
        assert_eq!(
            parsed.timestamp.timestamp_millis(),
            row.timestamp.timestamp_millis()
        );
    }

    #[test]
    fn test_from_fields_rejects_bad_rows() {
        let short = vec!["x".to_string()];
        assert!(matches!(
            EventRow::from_fields(&short, 3),
            Err(EventLogError::InvalidRow { line: 3, .. })
        ));

        let bad_kind: Vec<String> = ["2024-01-01T00:00:00.000", "1", "a", "b", "Bogus", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(EventRow::from_fields(&bad_kind, 4).is_err());
    }
}
