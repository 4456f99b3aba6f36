//! # netutil-event-log
//!
//! Durable capture of connection events.
//!
//! Every event published to the durable sink becomes one row of a CSV file:
//!
//! ```text
//! Timestamp,Connection ID,End Point 1,End Point 2,Type,Data
//! 2024-03-09T07:05:01.123,1,127.0.0.1:5000,127.0.0.1:61000,Connected,
//! 2024-03-09T07:05:01.124,1,127.0.0.1:5000,127.0.0.1:61000,OutboundData,68-69
//! ```
//!
//! The file starts with a UTF-8 byte-order mark, fields are quoted per
//! RFC 4180 and rows end with the host platform's line terminator.
//!
//! A single writer task drains the sink and appends rows; a sibling task
//! flushes the file once per [`FLUSH_INTERVAL`]. Rows still buffered when the
//! process dies abnormally may be lost.

mod csv;
mod error;
mod row;
mod writer;

pub use csv::{encode_row, CsvReader, CsvWriter, RowSink, LINE_ENDING, UTF8_BOM};
pub use error::EventLogError;
pub use row::{EventRow, HEADER};
pub use writer::{read_event_log, EventLog, EventLogConfig, EventLogStats, FLUSH_INTERVAL};
