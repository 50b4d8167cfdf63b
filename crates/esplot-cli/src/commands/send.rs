//! Plot submission command.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args;
use colored::Colorize;
use esplot_core::document::{render_plot_document, DEFAULT_TITLE};
use esplot_core::producer::DEFAULT_BROKER_URL;
use esplot_core::PlotClient;
use reqwest::Url;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::output;

#[derive(Args)]
pub struct SendArgs {
    /// File to submit (an HTML page, or an ES module with --script)
    pub file: PathBuf,

    /// Wrap the file as a script into a full-page plot document
    #[arg(long)]
    pub script: bool,

    /// Page title used with --script
    #[arg(long, default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Broker URL
    #[arg(long, env = "ESPLOT_URL", default_value = DEFAULT_BROKER_URL)]
    pub url: String,

    /// Start a broker in the background if none is running
    #[arg(long)]
    pub launch: bool,

    /// Connection attempts before giving up (500ms apart)
    #[arg(long, default_value_t = 60)]
    pub attempts: u32,

    /// Override the content type guessed from the file extension
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Guess the submission content type from a file extension.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Arguments for an `esplot serve` that listens where `url` points.
fn serve_args(url: &str, config_path: Option<&Path>) -> Result<Vec<OsString>> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid broker URL '{}'", url))?;
    if parsed.scheme() != "http" {
        bail!("Cannot launch a broker for '{}': only http URLs are served", url);
    }
    let host = parsed
        .host_str()
        .with_context(|| format!("Broker URL '{}' has no host", url))?;
    let port = parsed
        .port_or_known_default()
        .with_context(|| format!("Broker URL '{}' has no port", url))?;

    let mut args: Vec<OsString> = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.into());
    }
    args.push("serve".into());
    args.push("--host".into());
    args.push(host.trim_start_matches('[').trim_end_matches(']').into());
    args.push("--port".into());
    args.push(port.to_string().into());
    Ok(args)
}

/// Start `esplot serve` detached from this process.
fn launch_broker(url: &str, config_path: Option<&Path>) -> Result<()> {
    let args = serve_args(url, config_path)?;
    let exe = std::env::current_exe().context("Failed to locate the esplot executable")?;
    Command::new(exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to start the broker")?;
    tracing::info!("Started broker in the background");
    Ok(())
}

pub async fn execute(args: SendArgs, config_path: Option<&Path>) -> Result<()> {
    let raw = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let (body, content_type) = if args.script {
        let script = String::from_utf8(raw)
            .with_context(|| format!("{} is not valid UTF-8", args.file.display()))?;
        let page = render_plot_document(&script, &args.title)?;
        (Bytes::from(page), "text/html; charset=utf-8".to_string())
    } else {
        let content_type = args
            .content_type
            .clone()
            .unwrap_or_else(|| content_type_for(&args.file).to_string());
        (Bytes::from(raw), content_type)
    };

    let client = PlotClient::with_url(&args.url).max_attempts(args.attempts);

    if args.launch && !client.is_running().await {
        println!("{}", "Esplot: starting viewer...".dimmed());
        launch_broker(&args.url, config_path)?;
    }

    println!("{}", "Esplot: opening plot...".dimmed());
    let size = body.len();
    let attempts = client
        .submit_with_retry(body, &content_type)
        .await
        .with_context(|| format!("Failed to submit plot to {}", client.base_url()))?;

    output::print_submitted(&args.file.display().to_string(), size, attempts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_targets_url_port() {
        let args = serve_args("http://127.0.0.1:5000", None).unwrap();
        assert_eq!(
            args,
            ["serve", "--host", "127.0.0.1", "--port", "5000"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[test]
    fn test_launch_forwards_config() {
        let args = serve_args(
            "http://localhost:46852/",
            Some(Path::new("/etc/esplot/esplot.toml")),
        )
        .unwrap();
        assert_eq!(
            args,
            [
                "--config",
                "/etc/esplot/esplot.toml",
                "serve",
                "--host",
                "localhost",
                "--port",
                "46852"
            ]
            .map(OsString::from)
            .to_vec()
        );
    }

    #[test]
    fn test_launch_defaults_to_port_80() {
        let args = serve_args("http://plots.local", None).unwrap();
        assert_eq!(args.last(), Some(&OsString::from("80")));
    }

    #[test]
    fn test_launch_rejects_non_http_url() {
        assert!(serve_args("https://127.0.0.1:5000", None).is_err());
        assert!(serve_args("not a url", None).is_err());
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(
            content_type_for(Path::new("plot.HTML")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("bundle.mjs")),
            "application/javascript"
        );
        assert_eq!(
            content_type_for(Path::new("frame.png")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(Path::new("no_extension")),
            "application/octet-stream"
        );
    }
}
