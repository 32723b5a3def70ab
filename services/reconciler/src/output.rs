//! CSV persistence of the cleaned table

use crate::model::SeriesEntry;
use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const OUTPUT_COLUMNS: [&str; 8] = [
    "date",
    "country",
    "state",
    "county",
    "confirmed",
    "deaths",
    "recovered",
    "last_update",
];

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    date: String,
    country: &'a str,
    state: Option<&'a str>,
    county: Option<&'a str>,
    confirmed: Option<i64>,
    deaths: Option<i64>,
    recovered: Option<i64>,
    last_update: Option<String>,
}

impl<'a> From<&'a SeriesEntry> for OutputRow<'a> {
    fn from(entry: &'a SeriesEntry) -> Self {
        OutputRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            country: &entry.place.country,
            state: entry.place.state.as_deref(),
            county: entry.place.county.as_deref(),
            confirmed: entry.counts.confirmed,
            deaths: entry.counts.deaths,
            recovered: entry.counts.recovered,
            last_update: entry
                .last_update
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// Header row always present, even for an empty table; no index column
pub fn write_csv<W: Write>(writer: W, entries: &[SeriesEntry]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(OUTPUT_COLUMNS)?;
    for entry in entries {
        writer.serialize(OutputRow::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write next to the destination first, then rename: a failed run never
/// leaves a truncated table behind.
pub fn write_csv_file(path: &Path, entries: &[SeriesEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("csv.partial");
    let file = std::fs::File::create(&staging)?;
    write_csv(std::io::BufWriter::new(file), entries)?;
    std::fs::rename(&staging, path)?;
    info!("Wrote {} rows to {}", entries.len(), path.display());
    Ok(())
}
