//! Collector CLI - warms the local cache with one remote file
//!
//! Usage:
//!   # Fetch (or reuse from cache) a single file:
//!   cargo run --bin collector -- --host https://raw.githubusercontent.com \
//!       --path nytimes/covid-19-data/master/us-counties.csv
//!
//!   # Force re-download even if cached:
//!   cargo run --bin collector -- --host ... --path ... --force

use anyhow::{Context, Result};
use clap::Parser;
use collector::{Fetch, Fetcher, FetcherConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Fetches raw source files into the local cache")]
struct Args {
    /// Remote host, including scheme
    #[arg(long)]
    host: String,

    /// Path of the file on the host
    #[arg(long)]
    path: String,

    /// Force re-download even if cached
    #[arg(long, default_value = "false")]
    force: bool,

    /// Cache directory (overrides CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = FetcherConfig::from_env();
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }

    info!("=== Collector ===");
    info!("Cache: {}", config.cache_dir.display());

    let fetcher = Fetcher::new(config).context("Failed to build HTTP client")?;
    let fetched = fetcher
        .fetch(&args.host, &args.path, args.force)
        .await
        .with_context(|| format!("Failed to fetch {}/{}", args.host, args.path))?;

    info!(
        "{} {} ({} bytes, {})",
        if fetched.from_cache { "Cached:" } else { "Collected:" },
        fetched.cache_path.display(),
        fetched.bytes.len(),
        fetched.content_hash
    );
    info!("Captured at: {}", fetched.captured_at.format("%Y-%m-%d %H:%M:%S"));

    Ok(())
}
