//! Schema normalization - unions daily reports captured under different formats
//!
//! Each schema version declares its exact column set. Files are checked
//! against it before anything is read: a drifted header means a format we do
//! not know yet, and that must stop the run.

use crate::config::SchemaVersion;
use crate::model::{Counts, RawRecord};
use crate::read::{cell, parse_count, parse_timestamp, CsvTable};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Column set every version is normalized to
pub const TARGET_COLUMNS: [&str; 7] = [
    "admin2",
    "confirmed",
    "country_region",
    "deaths",
    "last_update",
    "province_state",
    "recovered",
];

/// One fetched daily report
#[derive(Debug, Clone)]
pub struct DailyFile {
    pub date: NaiveDate,
    pub table: CsvTable,
}

/// The unioned raw table plus the newest "last update" seen in it
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub records: Vec<RawRecord>,
    pub timestamp: Option<NaiveDateTime>,
}

/// "Province/State" -> "province_state", "Last Update" -> "last_update"
pub fn normalize_column(name: &str) -> String {
    name.replace([' ', '/'], "_").to_lowercase()
}

/// Columns a version ends up with after dropping, renaming and county fill-in
pub fn normalized_columns(version: &SchemaVersion) -> BTreeSet<String> {
    let mut columns: BTreeSet<String> = version
        .columns
        .iter()
        .filter(|c| !version.drop.contains(*c))
        .map(|c| normalize_column(c))
        .collect();
    columns.insert("admin2".to_string());
    columns
}

fn check_target(version: &SchemaVersion) -> Result<()> {
    let target: BTreeSet<String> = TARGET_COLUMNS.iter().map(|c| c.to_string()).collect();
    let found = normalized_columns(version);
    if found != target {
        return Err(Error::Config(format!(
            "Schema version {} normalizes to {:?}, expected {:?}",
            version.id, found, target
        )));
    }
    Ok(())
}

/// Every file of a version must carry exactly the declared columns
pub fn check_schema(version: &SchemaVersion, files: &[DailyFile]) -> Result<()> {
    let expected = version.column_set();
    for file in files {
        let found: BTreeSet<String> = file.table.headers.iter().cloned().collect();
        if found != expected {
            return Err(Error::SchemaMismatch {
                version: version.id.clone(),
                file: file.table.name.clone(),
                expected: expected.into_iter().collect(),
                found: found.into_iter().collect(),
            });
        }
    }
    Ok(())
}

fn read_version(version: &SchemaVersion, files: &[DailyFile]) -> Result<Vec<RawRecord>> {
    check_target(version)?;
    check_schema(version, files)?;

    let mut records = Vec::new();
    for file in files {
        let table = &file.table;
        let by_name: BTreeMap<String, usize> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !version.drop.contains(*h))
            .map(|(i, h)| (normalize_column(h), i))
            .collect();
        let col = |name: &str| by_name.get(name).copied();
        let last_update_col = table.column(&version.last_update_column);

        for (line_idx, row) in table.rows.iter().enumerate() {
            let line = line_idx + 2;
            let Some(country) = cell(row, col("country_region")) else {
                warn!("{} line {}: no country, row skipped", table.name, line);
                continue;
            };

            let last_update = cell(row, last_update_col).and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    warn!("{} line {}: unparseable last update '{}'", table.name, line, raw);
                }
                parsed
            });

            records.push(RawRecord {
                file_date: file.date,
                file_name: table.name.clone(),
                country: country.to_string(),
                state: cell(row, col("province_state")).map(str::to_string),
                county: cell(row, col("admin2")).map(str::to_string),
                counts: Counts::new(
                    parse_count(cell(row, col("confirmed"))),
                    parse_count(cell(row, col("deaths"))),
                    parse_count(cell(row, col("recovered"))),
                ),
                last_update,
                patched: false,
            });
        }
    }
    Ok(records)
}

/// Canonical order of the raw table
pub fn sort_raw(records: &mut [RawRecord]) {
    records.sort_by(|a, b| {
        (a.file_date, &a.country, &a.state, &a.county, a.counts, a.last_update).cmp(&(
            b.file_date,
            &b.country,
            &b.state,
            &b.county,
            b.counts,
            b.last_update,
        ))
    });
}

/// Normalize every version's files and union them.
/// This function is DETERMINISTIC: same files = same table.
pub fn consolidate(
    versions: &[SchemaVersion],
    files_by_version: &BTreeMap<String, Vec<DailyFile>>,
) -> Result<RawTable> {
    let mut records = Vec::new();
    for version in versions {
        let files = files_by_version
            .get(&version.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let rows = read_version(version, files)?;
        debug!(
            "Schema {}: {} files, {} rows",
            version.id,
            files.len(),
            rows.len()
        );
        records.extend(rows);
    }

    sort_raw(&mut records);
    let timestamp = records.iter().filter_map(|r| r.last_update).max();
    info!(
        "Consolidated {} raw rows (latest update: {})",
        records.len(),
        timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(RawTable { records, timestamp })
}
