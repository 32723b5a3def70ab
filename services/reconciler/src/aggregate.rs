//! Aggregation - sums the duplicates that label resolution creates
//!
//! before:
//!   country,        state, deaths,         last_update
//!        US,   California,      2, 2020-02-09 01:00:00
//!        US,   California,      2, 2020-02-09 02:00:00
//!        US,   California,      1, 2020-02-09 03:00:00
//! after:
//!   country,        state, deaths,         last_update
//!        US,   California,      5, 2020-02-09 03:00:00

use crate::model::{AggregatedRecord, Counts, Metric, Place, ResolvedRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Grouping key: missing state falls back to the country, missing county to
/// the state. The emitted place keeps missing levels missing.
pub fn place_key(country: &str, state: Option<&str>, county: Option<&str>) -> Place {
    let state = state.unwrap_or(country);
    let county = county.unwrap_or(state);
    Place::new(country, Some(state), Some(county))
}

/// Null only when both sides are null
fn add(acc: Option<i64>, value: Option<i64>) -> Option<i64> {
    match (acc, value) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

/// Group by (date, country, state, county): metrics summed, newest last
/// update kept, original state labels collected in input order.
/// A level is reported when any member reported it.
/// Output is ordered by the group key.
pub fn aggregate(records: Vec<ResolvedRecord>) -> Vec<AggregatedRecord> {
    let mut groups: BTreeMap<(NaiveDate, Place), AggregatedRecord> = BTreeMap::new();

    for resolved in records {
        let record = resolved.record;
        let key = place_key(
            &record.country,
            record.state.as_deref(),
            record.county.as_deref(),
        );
        let entry = groups
            .entry((record.file_date, key))
            .or_insert_with(|| AggregatedRecord {
                date: record.file_date,
                place: Place::country(record.country.as_str()),
                counts: Counts::default(),
                last_update: None,
                original_states: Vec::new(),
                patched: false,
            });

        if entry.place.state.is_none() {
            entry.place.state = record.state;
        }
        if entry.place.county.is_none() {
            entry.place.county = record.county;
        }

        for metric in Metric::ALL {
            let slot = entry.counts.get_mut(metric);
            *slot = add(*slot, record.counts.get(metric));
        }
        entry.last_update = entry.last_update.max(record.last_update);
        entry.patched |= record.patched;
        entry.original_states.push(resolved.original_state);
    }

    groups.into_values().collect()
}
