//! Broker server command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use esplot_core::BrokerConfig;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on [default: 46852]
    #[arg(long, env = "ESPLOT_PORT")]
    pub port: Option<u16>,

    /// Host to bind to [default: 127.0.0.1]
    #[arg(long, env = "ESPLOT_HOST")]
    pub host: Option<String>,

    /// Payloads a viewer may lag behind before it is dropped [default: 16]
    #[arg(long, env = "ESPLOT_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Largest accepted plot, in bytes
    #[arg(long, env = "ESPLOT_MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: Option<usize>,

    /// Directory served for paths the broker does not handle itself
    #[arg(long, env = "ESPLOT_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (with --log) [default: <tmp>/esplot/serve.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the file config.
    fn apply(self, mut config: BrokerConfig) -> BrokerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(limit) = self.max_payload_bytes {
            config.max_payload_bytes = limit;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = Some(dir);
        }
        config
    }
}

pub async fn execute(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = BrokerConfig::discover(config_path).context("Failed to load config")?;
    let config = args.apply(config);
    config.validate().context("Invalid config")?;

    let base = format!("{}:{}", config.host, config.port);

    println!();
    println!("  {} {}", "ESPlot".cyan().bold(), "Viewer Broker".bold());
    println!();
    println!("  {}     http://{}", "Viewer".green(), base);
    println!("  {}     http://{}/new", "Submit".green(), base);
    println!("  {}  ws://{}/websocket", "WebSocket".green(), base);
    println!(
        "  {}      {} per viewer",
        "Queue".green(),
        config.queue_capacity
    );
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    esplot_web::run_server(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let args = ServeArgs {
            port: Some(5000),
            host: None,
            queue_capacity: Some(1),
            max_payload_bytes: None,
            static_dir: None,
            log: false,
            log_file: None,
        };
        let file = BrokerConfig {
            host: "0.0.0.0".to_string(),
            queue_capacity: 8,
            ..BrokerConfig::default()
        };

        let config = args.apply(file);
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.queue_capacity, 1);
    }
}
