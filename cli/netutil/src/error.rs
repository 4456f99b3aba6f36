//! Error handling and display for the CLI.

use colored::Colorize;
use netutil_relay::RelayError;
use thiserror::Error;

use crate::commands::Protocol;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0} protocol is not currently supported.")]
    UnsupportedProtocol(Protocol),

    #[error("Invalid end point '{value}': expected <ip>:<port>")]
    InvalidEndpoint { value: String },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = hint_for(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::UnsupportedProtocol(_) => Some("Only tcp is supported."),
            CliError::InvalidEndpoint { .. } => {
                Some("Use an address such as 127.0.0.1:5000 or [::1]:5000.")
            }
        };
    }

    match err.downcast_ref::<RelayError>()? {
        RelayError::Bind { .. } => Some("Is another process already listening on this end point?"),
        RelayError::Connect { .. } | RelayError::ConnectTimeout { .. } => {
            Some("Check that the remote end point is reachable.")
        }
        RelayError::EventLog(_) => Some("Check that the event log directory exists and is writable."),
        RelayError::Io(_) => None,
    }
}
