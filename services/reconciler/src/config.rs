//! Run settings and the declarative reconciliation tables
//!
//! Everything that is domain knowledge rather than logic (schema versions,
//! label overrides, point patches, backfill rows, remote locations) lives in
//! `config/reconcile.json`. The file is compiled in as the default and can be
//! replaced at runtime.

use crate::model::Metric;
use crate::{Error, Result};
use chrono::NaiveDate;
use collector::FetcherConfig;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const BUILTIN_CONFIG: &str = include_str!("../config/reconcile.json");

// =============================================================================
// Environment settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub fetcher: FetcherConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            ),
            config_path: std::env::var("RECONCILE_CONFIG").ok().map(PathBuf::from),
            fetcher: FetcherConfig::from_env(),
        }
    }
}

// =============================================================================
// Reconciliation tables
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SourceLocation {
    pub host: String,
    pub path: String,
}

/// One historical file format of the daily reports
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaVersion {
    pub id: String,
    pub start: NaiveDate,
    /// Open end means "up to today"
    #[serde(default)]
    pub end: Option<NaiveDate>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub drop: Vec<String>,
    pub last_update_column: String,
}

impl SchemaVersion {
    pub fn column_set(&self) -> BTreeSet<String> {
        self.columns.iter().cloned().collect()
    }

    /// Every file date covered by this version, inclusive
    pub fn dates(&self, today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        let end = self.end.unwrap_or(today);
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// A literal correction: set `metric` to `value` on every row of `date`
/// matching the optional country/state filters
#[derive(Debug, Clone, Deserialize)]
pub struct PointPatch {
    pub date: NaiveDate,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub metric: Metric,
    pub value: i64,
}

/// A synthetic row appended to the raw table
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillRow {
    pub date: NaiveDate,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub confirmed: Option<i64>,
    #[serde(default)]
    pub deaths: Option<i64>,
    #[serde(default)]
    pub recovered: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    pub version: String,
    pub sources: BTreeMap<String, SourceLocation>,
    pub schema_versions: Vec<SchemaVersion>,
    #[serde(default)]
    pub country_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub state_quirk_countries: Vec<String>,
    #[serde(default)]
    pub state_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub region_codes: BTreeMap<String, String>,
    #[serde(default)]
    pub point_patches: Vec<PointPatch>,
    #[serde(default)]
    pub backfill_rows: Vec<BackfillRow>,
    #[serde(default)]
    pub ecdc_country_overrides: BTreeMap<String, String>,
}

impl ReconcileConfig {
    /// Tables compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CONFIG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ReconcileConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn source(&self, key: &str) -> Result<&SourceLocation> {
        self.sources
            .get(key)
            .ok_or_else(|| Error::Config(format!("No location configured for source '{}'", key)))
    }

    fn validate(&self) -> Result<()> {
        if self.schema_versions.is_empty() {
            return Err(Error::Config("No schema versions declared".to_string()));
        }
        for version in &self.schema_versions {
            let columns = version.column_set();
            if let Some(end) = version.end {
                if end < version.start {
                    return Err(Error::Config(format!(
                        "Schema version {} ends ({}) before it starts ({})",
                        version.id, end, version.start
                    )));
                }
            }
            if !columns.contains(&version.last_update_column) {
                return Err(Error::Config(format!(
                    "Schema version {}: last update column '{}' not among its columns",
                    version.id, version.last_update_column
                )));
            }
            if let Some(missing) = version.drop.iter().find(|c| !columns.contains(*c)) {
                return Err(Error::Config(format!(
                    "Schema version {}: dropped column '{}' not among its columns",
                    version.id, missing
                )));
            }
        }
        Ok(())
    }
}
