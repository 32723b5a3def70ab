//! Reconciler CLI - fetches one source, cleans it and writes the table
//!
//! Usage:
//!   # Rebuild the JHU table from cached daily reports:
//!   cargo run --bin reconciler -- --source jhu
//!
//!   # Re-download the ECDC file and write somewhere else:
//!   cargo run --bin reconciler -- --source ecdc --refresh --output /tmp/ecdc.csv

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use collector::Fetcher;
use reconciler::config::{ReconcileConfig, Settings};
use reconciler::model::SeriesEntry;
use reconciler::output::write_csv_file;
use reconciler::sources::{jhu, Feed, FeedSource, Jhu};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Jhu,
    Ecdc,
    Ctp,
    Nyt,
    Dpc,
}

impl SourceArg {
    fn feed(self) -> Option<Feed> {
        match self {
            SourceArg::Jhu => None,
            SourceArg::Ecdc => Some(Feed::Ecdc),
            SourceArg::Ctp => Some(Feed::Ctp),
            SourceArg::Nyt => Some(Feed::Nyt),
            SourceArg::Dpc => Some(Feed::Dpc),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "reconciler", about = "Reconciles case reports into clean time series")]
struct Args {
    /// Source to reconcile
    #[arg(long, value_enum)]
    source: SourceArg,

    /// Re-download even if cached (default for single-file sources)
    #[arg(long, conflicts_with = "no_refresh")]
    refresh: bool,

    /// Reuse cached files (default for JHU daily reports)
    #[arg(long)]
    no_refresh: bool,

    /// Reconciliation tables (overrides RECONCILE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file (default: <DATA_DIR>/<source>.csv)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    fn refresh(&self) -> bool {
        match (self.refresh, self.no_refresh) {
            (true, _) => true,
            (_, true) => false,
            // published daily reports never change; the single files do
            _ => !matches!(self.source, SourceArg::Jhu),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconciler=info,collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::from_env();

    let config = match args.config.as_ref().or(settings.config_path.as_ref()) {
        Some(path) => ReconcileConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ReconcileConfig::builtin().context("Built-in reconciliation tables are invalid")?,
    };
    let config = Arc::new(config);
    let fetcher = Fetcher::new(settings.fetcher.clone()).context("Failed to build HTTP client")?;
    let refresh = args.refresh();

    let (shortname, entries): (&str, Vec<SeriesEntry>) = match args.source.feed() {
        None => {
            info!("=== {} ===", jhu::NAME);
            let source = Jhu::new(fetcher, config, refresh);
            let entries = source.clean().await.context("JHU reconciliation failed")?;
            match source.timestamp().await? {
                Some(ts) => info!("Latest update: {}", ts.format("%Y-%m-%d %H:%M:%S")),
                None => info!("Latest update: none"),
            }
            (jhu::SHORTNAME, entries.to_vec())
        }
        Some(feed) => {
            info!("=== {} ===", feed.name());
            let source = FeedSource::new(feed, fetcher, config, refresh);
            let entries = source
                .clean()
                .await
                .with_context(|| format!("{} reconciliation failed", feed.shortname()))?;
            (feed.shortname(), entries.to_vec())
        }
    };

    let output = args.output.unwrap_or_else(|| {
        settings
            .data_dir
            .join(format!("{}.csv", shortname.to_lowercase()))
    });
    write_csv_file(&output, &entries)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("{}: {} rows -> {}", shortname, entries.len(), output.display());
    Ok(())
}
