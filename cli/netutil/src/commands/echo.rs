//! `echo-server` command.

use anyhow::Result;
use clap::Args;
use netutil_relay::{EchoConfig, EchoServer};

use super::{parse_endpoint, CommandContext, EventArgs};

#[derive(Debug, Args)]
pub struct EchoCommand {
    /// End point to listen on, e.g. 0.0.0.0:5000.
    #[arg(short, long)]
    pub bind: String,

    #[command(flatten)]
    pub events: EventArgs,
}

impl EchoCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut config = EchoConfig::new(parse_endpoint(&self.bind)?);
        config.events = ctx.options;

        let server = EchoServer::bind(config, Some(ctx.live)).await?;
        server.run(ctx.stop).await?;
        Ok(())
    }
}
