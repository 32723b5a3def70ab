//! New York Times US counties

use super::sort_by_date;
use crate::model::{Counts, Place, SeriesEntry};
use crate::read::{cell, parse_count, parse_date, CsvTable};
use crate::Result;

pub fn clean(table: &CsvTable) -> Result<Vec<SeriesEntry>> {
    let date_col = table.require("date")?;
    let county_col = table.require("county")?;
    let state_col = table.require("state")?;
    let cases_col = table.require("cases")?;
    let deaths_col = table.require("deaths")?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let date = parse_date(table, idx + 2, cell(row, Some(date_col)), "%Y-%m-%d")?;
        entries.push(SeriesEntry {
            date,
            place: Place::new(
                "US",
                cell(row, Some(state_col)),
                cell(row, Some(county_col)),
            ),
            counts: Counts::new(
                parse_count(cell(row, Some(cases_col))),
                parse_count(cell(row, Some(deaths_col))),
                None,
            ),
            last_update: None,
            patched: false,
        });
    }

    sort_by_date(&mut entries);
    Ok(entries)
}
