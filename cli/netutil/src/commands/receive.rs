//! `receive-client` command.

use anyhow::Result;
use clap::Args;
use netutil_relay::{ReceiveClient, ReceiveConfig};

use super::{parse_endpoint, CommandContext, EventArgs};

#[derive(Debug, Args)]
pub struct ReceiveCommand {
    /// End point to connect to, e.g. 192.168.1.1:5000.
    #[arg(short, long)]
    pub connect: String,

    #[command(flatten)]
    pub events: EventArgs,
}

impl ReceiveCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut config = ReceiveConfig::new(parse_endpoint(&self.connect)?);
        config.events = ctx.options;

        ReceiveClient::new(config, Some(ctx.live)).run(ctx.stop).await?;
        Ok(())
    }
}
