//! Protezione Civile, Italian regions
//!
//! The `data` column is a timestamp; the report date is its day.

use super::sort_by_date;
use crate::model::{Counts, Place, SeriesEntry};
use crate::read::{cell, parse_count, parse_timestamp, CsvTable};
use crate::{Error, Result};

pub fn clean(table: &CsvTable) -> Result<Vec<SeriesEntry>> {
    let data_col = table.require("data")?;
    let region_col = table.require("denominazione_regione")?;
    let total_col = table.require("totale_casi")?;
    let deceased_col = table.require("deceduti")?;
    let recovered_col = table.require("dimessi_guariti")?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let raw = cell(row, Some(data_col)).unwrap_or_default();
        let timestamp = parse_timestamp(raw).ok_or_else(|| Error::Parse {
            file: table.name.clone(),
            line: idx + 2,
            message: format!("invalid timestamp '{}'", raw),
        })?;
        entries.push(SeriesEntry {
            date: timestamp.date(),
            place: Place::new("Italy", cell(row, Some(region_col)), None),
            counts: Counts::new(
                parse_count(cell(row, Some(total_col))),
                parse_count(cell(row, Some(deceased_col))),
                parse_count(cell(row, Some(recovered_col))),
            ),
            last_update: Some(timestamp),
            patched: false,
        });
    }

    sort_by_date(&mut entries);
    Ok(entries)
}
