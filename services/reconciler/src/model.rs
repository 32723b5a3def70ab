//! Record types flowing between pipeline stages

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];
}

/// Confirmed/deaths/recovered; any of them may be unreported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Counts {
    pub confirmed: Option<i64>,
    pub deaths: Option<i64>,
    pub recovered: Option<i64>,
}

impl Counts {
    pub fn new(confirmed: Option<i64>, deaths: Option<i64>, recovered: Option<i64>) -> Self {
        Self { confirmed, deaths, recovered }
    }

    pub fn get(&self, metric: Metric) -> Option<i64> {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut Option<i64> {
        match metric {
            Metric::Confirmed => &mut self.confirmed,
            Metric::Deaths => &mut self.deaths,
            Metric::Recovered => &mut self.recovered,
        }
    }
}

/// One row of one daily file, labels as published
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub file_date: NaiveDate,
    /// Empty for synthetic rows
    pub file_name: String,
    pub country: String,
    pub state: Option<String>,
    pub county: Option<String>,
    pub counts: Counts,
    pub last_update: Option<NaiveDateTime>,
    /// A point correction overwrote one of the counts
    pub patched: bool,
}

/// A raw record whose labels went through resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub record: RawRecord,
    pub original_state: Option<String>,
}

/// Canonical (country, state, county) key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Place {
    pub country: String,
    pub state: Option<String>,
    pub county: Option<String>,
}

impl Place {
    pub fn new(country: impl Into<String>, state: Option<&str>, county: Option<&str>) -> Self {
        Self {
            country: country.into(),
            state: state.map(str::to_string),
            county: county.map(str::to_string),
        }
    }

    pub fn country(country: impl Into<String>) -> Self {
        Self::new(country, None, None)
    }
}

/// One row per (date, place) after duplicates were summed
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub date: NaiveDate,
    pub place: Place,
    pub counts: Counts,
    pub last_update: Option<NaiveDateTime>,
    /// Pre-resolution state labels of every member, in input order
    pub original_states: Vec<Option<String>>,
    /// At least one member carries a point correction
    pub patched: bool,
}

/// A row of the cleaned output table
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub date: NaiveDate,
    pub place: Place,
    pub counts: Counts,
    pub last_update: Option<NaiveDateTime>,
    /// Holds a deliberate correction, so it may sit below the day before
    pub patched: bool,
}

impl From<AggregatedRecord> for SeriesEntry {
    fn from(record: AggregatedRecord) -> Self {
        Self {
            date: record.date,
            place: record.place,
            counts: record.counts,
            last_update: record.last_update,
            patched: record.patched,
        }
    }
}
