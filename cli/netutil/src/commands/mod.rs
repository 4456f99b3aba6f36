//! CLI commands.

mod echo;
mod proxy;
mod receive;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use netutil_events::{ChannelSink, DataFormat};
use netutil_relay::{EventOptions, SharedSink};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::console::{self, OutputFormat};
use crate::error::CliError;
use crate::logging::LogFormat;

/// netutil - TCP network utilities with connection event capture.
#[derive(Debug, Parser)]
#[command(name = "netutil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Diagnostic log level (overridden by RUST_LOG).
    #[arg(long, global = true, env = "NETUTIL_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Diagnostic log encoding.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Relay every accepted client to a fixed destination.
    ProxyServer(proxy::ProxyCommand),

    /// Write back whatever each client sends.
    EchoServer(echo::EchoCommand),

    /// Connect to a remote end point and receive until it closes.
    ReceiveClient(receive::ReceiveCommand),
}

/// IP protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("Tcp"),
            Protocol::Udp => f.write_str("Udp"),
        }
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct EventArgs {
    /// IP protocol.
    #[arg(short, long, value_enum, default_value_t = Protocol::Tcp)]
    protocol: Protocol,

    /// Rendering of data payloads.
    #[arg(short, long, default_value = "binary", value_parser = parse_data_format)]
    format: DataFormat,

    /// Show data events on the console.
    #[arg(short, long)]
    display_data: bool,

    /// Write every event to this CSV file.
    #[arg(short, long, env = "NETUTIL_EVENT_LOG_FILE")]
    event_log_file: Option<PathBuf>,

    /// Console event encoding.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

impl EventArgs {
    fn check_protocol(&self) -> Result<(), CliError> {
        match self.protocol {
            Protocol::Tcp => Ok(()),
            other => Err(CliError::UnsupportedProtocol(other)),
        }
    }

    fn event_options(&self) -> EventOptions {
        EventOptions {
            format: self.format,
            display_data: self.display_data,
            event_log_file: self.event_log_file.clone(),
        }
    }
}

fn parse_data_format(value: &str) -> Result<DataFormat, String> {
    value.parse().map_err(|e| format!("{e}"))
}

/// Parses an `<ip>:<port>` end point.
pub(crate) fn parse_endpoint(value: &str) -> Result<SocketAddr, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidEndpoint {
            value: value.to_string(),
        })
}

impl Cli {
    /// Run the selected engine until it ends or the process is interrupted.
    pub async fn run(self) -> Result<()> {
        let (engine, events) = match &self.command {
            Commands::ProxyServer(cmd) => ("Proxy Server", &cmd.events),
            Commands::EchoServer(cmd) => ("Echo Server", &cmd.events),
            Commands::ReceiveClient(cmd) => ("Client Receive", &cmd.events),
        };
        let events = events.clone();

        if events.output == OutputFormat::Text {
            println!(
                "{}",
                format!("netutil [Version {}] - {}", env!("CARGO_PKG_VERSION"), engine).bold()
            );
            println!();
        }
        events.check_protocol()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping");
                    let _ = stop_tx.send(true);
                }
                Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
            }
        });

        let (sink, rx) = ChannelSink::channel();
        let live: SharedSink = Arc::new(sink);
        let console = console::spawn(rx, events.format, events.output);

        let ctx = CommandContext {
            options: events.event_options(),
            live,
            stop: stop_rx,
        };
        let result = match self.command {
            Commands::ProxyServer(cmd) => cmd.run(ctx).await,
            Commands::EchoServer(cmd) => cmd.run(ctx).await,
            Commands::ReceiveClient(cmd) => cmd.run(ctx).await,
        };

        // The engine has released its sinks; the console ends after the
        // last event.
        if let Err(e) = console.await {
            warn!(error = %e, "Console task failed");
        }
        result
    }
}

/// What every command needs to start its engine.
pub struct CommandContext {
    pub options: EventOptions,
    pub live: SharedSink,
    pub stop: watch::Receiver<bool>,
}
