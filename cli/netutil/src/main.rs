//! netutil - TCP proxy, echo server and receive client.
//!
//! Every connection is reported as a stream of events on stdout and,
//! optionally, in a durable CSV log.

use clap::Parser;

mod commands;
mod console;
mod error;
mod logging;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    logging::init(&cli.log_level, cli.log_format);

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }
}
