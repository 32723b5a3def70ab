//! Data source handles
//!
//! A handle fetches its raw input at most once and cleans it at most once;
//! both results are kept for the lifetime of the handle. Building a new
//! handle is the only way to fetch again.

pub mod ctp;
pub mod dpc;
pub mod ecdc;
pub mod jhu;
pub mod nyt;

use crate::config::ReconcileConfig;
use crate::model::SeriesEntry;
use crate::read::CsvTable;
use crate::{Error, Result};
use collector::Fetch;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub use jhu::Jhu;

/// Sources published as one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Ecdc,
    Ctp,
    Nyt,
    Dpc,
}

impl Feed {
    pub fn name(&self) -> &'static str {
        match self {
            Feed::Ecdc => "European Centre for Disease Prevention and Control",
            Feed::Ctp => "The COVID Tracking Project",
            Feed::Nyt => "The New York Times",
            Feed::Dpc => "Dipartimento della Protezione Civile",
        }
    }

    pub fn shortname(&self) -> &'static str {
        match self {
            Feed::Ecdc => "ECDC",
            Feed::Ctp => "CTP",
            Feed::Nyt => "NYT",
            Feed::Dpc => "DPC",
        }
    }

    /// Key into the `sources` table of the reconciliation config
    pub fn key(&self) -> &'static str {
        match self {
            Feed::Ecdc => "ecdc",
            Feed::Ctp => "ctp",
            Feed::Nyt => "nyt",
            Feed::Dpc => "dpc",
        }
    }

    fn clean(&self, table: &CsvTable, config: &ReconcileConfig) -> Result<Vec<SeriesEntry>> {
        match self {
            Feed::Ecdc => ecdc::clean(table, config),
            Feed::Ctp => ctp::clean(table, config),
            Feed::Nyt => nyt::clean(table),
            Feed::Dpc => dpc::clean(table),
        }
    }
}

/// Handle on a single-file source. The file is required: any fetch
/// failure, "not found" included, aborts.
pub struct FeedSource<F> {
    feed: Feed,
    fetcher: F,
    config: Arc<ReconcileConfig>,
    refresh: bool,
    raw: OnceCell<CsvTable>,
    clean: OnceCell<Vec<SeriesEntry>>,
}

impl<F: Fetch> FeedSource<F> {
    pub fn new(feed: Feed, fetcher: F, config: Arc<ReconcileConfig>, refresh: bool) -> Self {
        Self {
            feed,
            fetcher,
            config,
            refresh,
            raw: OnceCell::new(),
            clean: OnceCell::new(),
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub async fn raw(&self) -> Result<&CsvTable> {
        self.raw
            .get_or_try_init(|| async {
                let location = self.config.source(self.feed.key())?;
                let fetched = self
                    .fetcher
                    .fetch(&location.host, &location.path, self.refresh)
                    .await
                    .map_err(Error::Fetch)?;
                info!(
                    "[{}] {} bytes ({})",
                    self.feed.shortname(),
                    fetched.bytes.len(),
                    fetched.content_hash
                );
                CsvTable::from_bytes(&location.path, &fetched.bytes)
            })
            .await
    }

    pub async fn clean(&self) -> Result<&[SeriesEntry]> {
        self.clean
            .get_or_try_init(|| async {
                let table = self.raw().await?;
                self.feed.clean(table, &self.config)
            })
            .await
            .map(Vec::as_slice)
    }
}

/// Order used by the feeds that need no series repair
pub(crate) fn sort_by_date(entries: &mut [SeriesEntry]) {
    entries.sort_by(|a, b| (a.date, &a.place).cmp(&(b.date, &b.place)));
}
