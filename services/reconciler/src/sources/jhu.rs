//! Johns Hopkins University daily reports
//!
//! One file per day, named `MM-DD-YYYY.csv`, published under three
//! successive formats. Days missing on the server are skipped. The cache is
//! used by default since published days never change.

use crate::aggregate::aggregate;
use crate::config::ReconcileConfig;
use crate::finalize::{finalize, FinalizeOptions};
use crate::model::SeriesEntry;
use crate::normalize::{consolidate, DailyFile, RawTable};
use crate::patch::patch_errors;
use crate::read::CsvTable;
use crate::resolve::resolve_labels;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use collector::Fetch;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const NAME: &str = "Johns Hopkins University";
pub const SHORTNAME: &str = "JHU";

pub struct Jhu<F> {
    fetcher: F,
    config: Arc<ReconcileConfig>,
    refresh: bool,
    today: NaiveDate,
    raw: OnceCell<RawTable>,
    clean: OnceCell<Vec<SeriesEntry>>,
}

impl<F: Fetch> Jhu<F> {
    pub fn new(fetcher: F, config: Arc<ReconcileConfig>, refresh: bool) -> Self {
        Self {
            fetcher,
            config,
            refresh,
            today: Utc::now().date_naive(),
            raw: OnceCell::new(),
            clean: OnceCell::new(),
        }
    }

    /// Last day requested for the open-ended schema version
    pub fn until(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Consolidated daily reports, fetched on first use
    pub async fn raw(&self) -> Result<&RawTable> {
        self.raw
            .get_or_try_init(|| async {
                let files = self.fetch_daily().await?;
                consolidate(&self.config.schema_versions, &files)
            })
            .await
    }

    /// Reconciled series, computed on first use
    pub async fn clean(&self) -> Result<&[SeriesEntry]> {
        self.clean
            .get_or_try_init(|| async {
                let raw = self.raw().await?;
                Ok::<_, Error>(clean(raw, &self.config))
            })
            .await
            .map(Vec::as_slice)
    }

    /// Newest "last update" across every fetched report
    pub async fn timestamp(&self) -> Result<Option<NaiveDateTime>> {
        Ok(self.raw().await?.timestamp)
    }

    async fn fetch_daily(&self) -> Result<BTreeMap<String, Vec<DailyFile>>> {
        let location = self.config.source("jhu")?;
        let mut by_version = BTreeMap::new();

        for version in &self.config.schema_versions {
            let mut files = Vec::new();
            for date in version.dates(self.today) {
                let name = format!("{}.csv", date.format("%m-%d-%Y"));
                let path = format!("{}/{}", location.path.trim_end_matches('/'), name);
                match self.fetcher.fetch(&location.host, &path, self.refresh).await {
                    Ok(fetched) => {
                        files.push(DailyFile {
                            date,
                            table: CsvTable::from_bytes(&name, &fetched.bytes)?,
                        });
                    }
                    Err(e) if e.is_not_found() => {
                        debug!("[{}] {} not published, skipping", SHORTNAME, name);
                    }
                    Err(e) => {
                        warn!("[{}] {} unavailable, skipping: {}", SHORTNAME, name, e);
                    }
                }
            }
            info!(
                "[{}] Schema {}: {} daily files",
                SHORTNAME,
                version.id,
                files.len()
            );
            by_version.insert(version.id.clone(), files);
        }

        Ok(by_version)
    }
}

/// Patch, resolve, aggregate and finalize the consolidated reports
pub fn clean(raw: &RawTable, config: &ReconcileConfig) -> Vec<SeriesEntry> {
    let patched = patch_errors(raw.records.clone(), &config.point_patches, &config.backfill_rows);
    let resolved = resolve_labels(patched, config);
    let aggregated = aggregate(resolved);
    debug!("[{}] {} aggregated rows", SHORTNAME, aggregated.len());

    let options = FinalizeOptions {
        clamp_regressions: true,
        drop_stale_tail: true,
        resample_daily: true,
        ..FinalizeOptions::default()
    };
    finalize(
        aggregated.into_iter().map(SeriesEntry::from).collect(),
        &options,
    )
}
