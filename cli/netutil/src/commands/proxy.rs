//! `proxy-server` command.

use anyhow::Result;
use clap::Args;
use netutil_relay::{ProxyConfig, ProxyServer};

use super::{parse_endpoint, CommandContext, EventArgs};

#[derive(Debug, Args)]
pub struct ProxyCommand {
    /// End point to listen on, e.g. 0.0.0.0:5000.
    #[arg(short, long)]
    pub bind: String,

    /// End point to relay to, e.g. 192.168.1.1:5000.
    #[arg(short, long)]
    pub connect: String,

    #[command(flatten)]
    pub events: EventArgs,
}

impl ProxyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut config = ProxyConfig::new(parse_endpoint(&self.bind)?, parse_endpoint(&self.connect)?);
        config.events = ctx.options;

        let server = ProxyServer::bind(config, Some(ctx.live)).await?;
        server.run(ctx.stop).await?;
        Ok(())
    }
}
