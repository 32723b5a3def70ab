//! ECDC worldwide case distribution
//!
//! One row per (report date, country) holding the new cases and deaths of
//! that day. Reports are dated at 06:00 CET and describe the previous day,
//! so each country's series is shifted back by one report before summing.

use crate::config::ReconcileConfig;
use crate::finalize::{finalize, FinalizeOptions};
use crate::model::{Counts, Place, SeriesEntry};
use crate::read::{cell, parse_count, parse_date, CsvTable};
use crate::{Error, Result};

/// `countriesAndTerritories` uses underscores for spaces
fn country_label(raw: &str, config: &ReconcileConfig) -> String {
    let spaced = raw.replace('_', " ");
    config
        .ecdc_country_overrides
        .get(&spaced)
        .cloned()
        .unwrap_or(spaced)
}

pub fn clean(table: &CsvTable, config: &ReconcileConfig) -> Result<Vec<SeriesEntry>> {
    let date_col = table.require("dateRep")?;
    let cases_col = table.require("cases")?;
    let deaths_col = table.require("deaths")?;
    let country_col = table.require("countriesAndTerritories")?;

    let mut entries = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let line = idx + 2;
        let date = parse_date(table, line, cell(row, Some(date_col)), "%d/%m/%Y")?;
        let country = cell(row, Some(country_col)).ok_or_else(|| Error::Parse {
            file: table.name.clone(),
            line,
            message: "empty country".to_string(),
        })?;
        entries.push(SeriesEntry {
            date,
            place: Place::country(country_label(country, config)),
            counts: Counts::new(
                parse_count(cell(row, Some(cases_col))),
                parse_count(cell(row, Some(deaths_col))),
                None,
            ),
            last_update: None,
            patched: false,
        });
    }

    let options = FinalizeOptions {
        shift_dates: true,
        cumulative_sum: true,
        clamp_regressions: true,
        drop_stale_tail: true,
        resample_daily: true,
        ..FinalizeOptions::default()
    };
    Ok(finalize(entries, &options))
}
