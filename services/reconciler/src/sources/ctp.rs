//! COVID Tracking Project, US states daily
//!
//! Already cumulative per state; only labels and dates need mapping.

use super::sort_by_date;
use crate::config::ReconcileConfig;
use crate::model::{Counts, Place, SeriesEntry};
use crate::read::{cell, parse_count, parse_date, parse_timestamp, CsvTable};
use crate::{Error, Result};

pub fn clean(table: &CsvTable, config: &ReconcileConfig) -> Result<Vec<SeriesEntry>> {
    let date_col = table.require("date")?;
    let state_col = table.require("state")?;
    let positive_col = table.require("positive")?;
    let death_col = table.require("death")?;
    // only present in later releases
    let recovered_col = table.column("recovered");
    let checked_col = table.column("dateChecked");

    let mut entries = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let line = idx + 2;
        let date = parse_date(table, line, cell(row, Some(date_col)), "%Y%m%d")?;
        let code = cell(row, Some(state_col)).ok_or_else(|| Error::Parse {
            file: table.name.clone(),
            line,
            message: "empty state".to_string(),
        })?;
        let state = config.region_codes.get(code).map(String::as_str).unwrap_or(code);

        entries.push(SeriesEntry {
            date,
            place: Place::new("US", Some(state), None),
            counts: Counts::new(
                parse_count(cell(row, Some(positive_col))),
                parse_count(cell(row, Some(death_col))),
                parse_count(cell(row, recovered_col)),
            ),
            last_update: cell(row, checked_col).and_then(parse_timestamp),
            patched: false,
        });
    }

    sort_by_date(&mut entries);
    Ok(entries)
}
