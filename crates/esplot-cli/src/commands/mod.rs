//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod send;
pub mod serve;
pub mod status;

/// ESPlot - push plots to live viewers
#[derive(Parser)]
#[command(name = "esplot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file (defaults to the per-user esplot.toml)
    #[arg(short, long, global = true, env = "ESPLOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the broker that pushes plots to connected viewers
    Serve(serve::ServeArgs),

    /// Submit a plot to a running broker
    Send(send::SendArgs),

    /// Show broker statistics
    Status(status::StatusArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve::execute(args, self.config.as_deref()).await,
            Commands::Send(args) => send::execute(args, self.config.as_deref()).await,
            Commands::Status(args) => status::execute(args).await,
        }
    }
}
