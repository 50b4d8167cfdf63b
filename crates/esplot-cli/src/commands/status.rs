//! Broker status command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use esplot_core::PlotClient;

use crate::output;

#[derive(Args)]
pub struct StatusArgs {
    /// Broker URL
    #[arg(long, env = "ESPLOT_URL", default_value = esplot_core::producer::DEFAULT_BROKER_URL)]
    pub url: String,

    /// Print raw JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let client = PlotClient::with_url(&args.url);

    if !client.is_running().await {
        println!(
            "{} No broker at {}. Start one with 'esplot serve'.",
            "✗".red(),
            client.base_url()
        );
        return Ok(());
    }

    let stats = client
        .stats()
        .await
        .with_context(|| format!("Failed to read status from {}", client.base_url()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        output::print_stats(client.base_url(), &stats);
    }

    Ok(())
}
