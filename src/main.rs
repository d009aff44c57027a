use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use feedflux::config::{Config, FetchOptions, Overrides};
use feedflux::feed::{fetch_all, HttpFeedSource, SourceOutcome};
use feedflux::util::validate_sources;

/// Default config file path (~/.config/feedflux/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("feedflux")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "ff",
    version,
    about = "Parse RSS, Atom and JSON feeds into one JSON item per line, recording and resuming fetch progress"
)]
struct Args {
    /// Feed URLs to fetch
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Record fetching progress in this directory
    #[arg(short, long = "record", value_name = "DIR")]
    record: Option<PathBuf>,

    /// Continue from the recorded progress (requires --record)
    #[arg(short = 'c', long = "continue")]
    resume: bool,

    /// Timeout in seconds for fetching each feed [default: 10]
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Emit entries that carry no publication date
    #[arg(long)]
    include_undated: bool,

    /// Config file (default: ~/.config/feedflux/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only items
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.as_ref().cloned().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => Config::default(),
    };

    let options = FetchOptions::resolve(
        &config,
        Overrides {
            record_dir: args.record,
            resume: args.resume,
            timeout_seconds: args.timeout,
            include_undated: args.include_undated,
        },
    )?;
    let sources = validate_sources(args.urls)?;

    let source = HttpFeedSource::new(&config.user_agent).context("Failed to build HTTP client")?;
    let mut run = fetch_all(Arc::new(source), sources, options)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while let Some(item) = run.next().await {
        serde_json::to_writer(&mut out, &item).context("Failed to serialize item")?;
        out.write_all(b"\n")
            .and_then(|_| out.flush())
            .context("Failed to write item to stdout")?;
    }
    drop(out);

    let summary = run.finish().await.context("Fetch aborted")?;

    for report in &summary.reports {
        if let SourceOutcome::Completed {
            fetched,
            emitted,
            watermark,
            ..
        } = report.outcome
        {
            tracing::debug!(
                url = %report.url,
                fetched = fetched,
                emitted = emitted,
                watermark = watermark,
                "Source done"
            );
        }
    }

    tracing::info!(
        sources = summary.reports.len() + summary.panicked,
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        items = summary.emitted(),
        "Fetch complete"
    );

    Ok(())
}
