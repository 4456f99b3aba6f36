//! Live event display.

use clap::ValueEnum;
use colored::Colorize;
use netutil_events::{
    ascii_segments, format_utc_iso8601, AsciiSegment, DataFormat, TcpEvent, TcpEventType,
};
use netutil_id::ConnectionId;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Console event encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Drains `rx` to stdout until every sender is gone.
pub fn spawn(
    rx: mpsc::UnboundedReceiver<TcpEvent>,
    format: DataFormat,
    output: OutputFormat,
) -> JoinHandle<()> {
    tokio::spawn(write_events(rx, format, output, tokio::io::stdout()))
}

async fn write_events<W>(
    mut rx: mpsc::UnboundedReceiver<TcpEvent>,
    format: DataFormat,
    output: OutputFormat,
    mut out: W,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let mut line = match output {
            OutputFormat::Text => render_text(&event, format),
            OutputFormat::Json => match render_json(&event, format) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to encode event");
                    continue;
                }
            },
        };
        line.push('\n');

        let mut written = out.write_all(line.as_bytes()).await;
        if written.is_ok() && rx.is_empty() {
            written = out.flush().await;
        }
        if let Err(e) = written {
            // Typically a closed pipe; events are still logged durably.
            debug!(error = %e, "Console output closed");
            return;
        }
    }
    let _ = out.flush().await;
}

/// Renders one event as a colored console line.
pub fn render_text(event: &TcpEvent, format: DataFormat) -> String {
    let timestamp = format_utc_iso8601(&event.timestamp());
    let id = event.connection_id();
    let (source, destination) = (event.source(), event.destination());

    match event.kind() {
        TcpEventType::Connected => {
            format!("{timestamp}, {source} - {destination}, Conn ID: {id}, Connected")
                .green()
                .to_string()
        }
        TcpEventType::Disconnected => {
            format!("{timestamp}, {source} - {destination}, Conn ID: {id}, Disconnected")
                .blue()
                .to_string()
        }
        TcpEventType::OutboundData => {
            let prefix =
                format!("{timestamp}, {source} -> {destination}, Conn ID: {id}, Out Data: ").cyan();
            format!("{prefix}{}", render_data(event.payload().unwrap_or_default(), format))
        }
        TcpEventType::InboundData => {
            let prefix =
                format!("{timestamp}, {source} <- {destination}, Conn ID: {id}, In Data:  ").yellow();
            format!("{prefix}{}", render_data(event.payload().unwrap_or_default(), format))
        }
        TcpEventType::Error => format!(
            "{timestamp}, {source} - {destination}, Conn ID: {id}, Error: {}",
            event.error_message().unwrap_or_default()
        )
        .red()
        .to_string(),
    }
}

fn render_data(data: &[u8], format: DataFormat) -> String {
    match format {
        DataFormat::Ascii => ascii_segments(data)
            .map(|segment| match segment {
                AsciiSegment::Text(text) => text.to_string(),
                AsciiSegment::Escaped(byte) => format!("[{byte:02x}]").black().on_white().to_string(),
            })
            .collect(),
        DataFormat::Binary | DataFormat::Utf8 => format.render(data),
    }
}

#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    connection_id: ConnectionId,
    source: &'a str,
    destination: &'a str,
    #[serde(rename = "type")]
    kind: TcpEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

/// Renders one event as a JSON line.
pub fn render_json(event: &TcpEvent, format: DataFormat) -> serde_json::Result<String> {
    let data = match event.kind() {
        TcpEventType::Error => event.error_message(),
        _ => event.payload().map(|bytes| format.render(bytes)),
    };

    serde_json::to_string(&EventRecord {
        timestamp: format_utc_iso8601(&event.timestamp()),
        connection_id: event.connection_id(),
        source: event.source(),
        destination: event.destination(),
        kind: event.kind(),
        data,
    })
}
