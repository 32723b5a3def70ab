//! Deterministic CSV reading shared by every source
//!
//! Same bytes = same table. Cells are trimmed, empty cells read as missing.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::warn;

/// Timestamp layouts seen in the "last update" column over time.
/// Two-digit years go first: `%Y` would accept "20" as year 20.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// A parsed CSV file: header row plus raw records
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl CsvTable {
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        // BOM sniffing: early daily reports start with one
        let (content, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
        if had_errors {
            warn!("{}: invalid UTF-8 replaced", name);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Index of a column the caller cannot work without
    pub fn require(&self, header: &str) -> Result<usize> {
        self.column(header).ok_or_else(|| Error::Parse {
            file: self.name.clone(),
            line: 1,
            message: format!("missing column '{}' in header {:?}", header, self.headers),
        })
    }
}

/// Non-empty cell value
pub fn cell(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).filter(|s| !s.is_empty())
}

/// Integer count; decimals are rounded, empty or garbage is missing
pub fn parse_count(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.round() as i64)
    })
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Date cell in a given layout, failing loudly: dates are row identity
pub fn parse_date(table: &CsvTable, line: usize, raw: Option<&str>, fmt: &str) -> Result<NaiveDate> {
    let raw = raw.unwrap_or_default();
    NaiveDate::parse_from_str(raw, fmt).map_err(|e| Error::Parse {
        file: table.name.clone(),
        line,
        message: format!("invalid date '{}' (expected {}): {}", raw, fmt, e),
    })
}
