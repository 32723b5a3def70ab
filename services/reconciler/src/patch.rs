//! Point corrections and synthetic backfill rows for the raw daily table
//!
//! Both lists are literal domain knowledge read from the reconciliation
//! tables. Matching is done on the labels exactly as published, before any
//! resolution.

use crate::config::{BackfillRow, PointPatch};
use crate::model::{Counts, RawRecord};
use tracing::{debug, warn};

impl PointPatch {
    pub fn matches(&self, record: &RawRecord) -> bool {
        record.file_date == self.date
            && self.country.as_ref().map_or(true, |c| *c == record.country)
            && self
                .state
                .as_ref()
                .map_or(true, |s| record.state.as_ref() == Some(s))
    }
}

impl From<&BackfillRow> for RawRecord {
    fn from(row: &BackfillRow) -> Self {
        RawRecord {
            file_date: row.date,
            file_name: String::new(),
            country: row.country.clone(),
            state: row.state.clone(),
            county: None,
            counts: Counts::new(row.confirmed, row.deaths, row.recovered),
            last_update: None,
            patched: false,
        }
    }
}

/// Overwrite one metric on every matching row; returns how many rows matched
pub fn apply_point_patch(records: &mut [RawRecord], patch: &PointPatch) -> usize {
    let mut matched = 0;
    for record in records.iter_mut().filter(|r| patch.matches(r)) {
        *record.counts.get_mut(patch.metric) = Some(patch.value);
        record.patched = true;
        matched += 1;
    }
    matched
}

/// Apply every point patch, then append the backfill rows.
///
/// A patch matching nothing stays a no-op but is logged: it usually means
/// the published data moved away from the correction table.
pub fn patch_errors(
    mut records: Vec<RawRecord>,
    patches: &[PointPatch],
    backfill: &[BackfillRow],
) -> Vec<RawRecord> {
    for patch in patches {
        let matched = apply_point_patch(&mut records, patch);
        if matched == 0 {
            warn!(
                "Point patch {} country={:?} state={:?} matched no rows",
                patch.date, patch.country, patch.state
            );
        } else {
            debug!(
                "Point patch {} {:?}={} applied to {} rows",
                patch.date, patch.metric, patch.value, matched
            );
        }
    }

    records.extend(backfill.iter().map(RawRecord::from));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::model::Metric;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(file_date: NaiveDate, country: &str, state: Option<&str>, confirmed: i64) -> RawRecord {
        RawRecord {
            file_date,
            file_name: format!("{}.csv", file_date.format("%m-%d-%Y")),
            country: country.to_string(),
            state: state.map(str::to_string),
            county: None,
            counts: Counts::new(Some(confirmed), Some(0), Some(0)),
            last_update: None,
            patched: false,
        }
    }

    fn travis_patch() -> PointPatch {
        PointPatch {
            date: date(2020, 2, 21),
            country: None,
            state: Some("Travis, CA".to_string()),
            metric: Metric::Confirmed,
            value: 0,
        }
    }

    // -------------------------------------------------------------------------
    // POINT PATCH TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_point_patch_overwrites_matching_rows() {
        let records = vec![
            raw(date(2020, 2, 21), "US", Some("Travis, CA"), 5),
            raw(date(2020, 2, 21), "US", Some("Travis, CA"), 2),
            raw(date(2020, 2, 21), "US", Some("Chicago, IL"), 2),
            raw(date(2020, 2, 22), "US", Some("Travis, CA"), 5),
        ];
        let patched = patch_errors(records, &[travis_patch()], &[]);

        assert_eq!(patched[0].counts.confirmed, Some(0));
        assert_eq!(patched[1].counts.confirmed, Some(0));
        assert_eq!(patched[2].counts.confirmed, Some(2));
        assert_eq!(patched[3].counts.confirmed, Some(5));
        // other metrics untouched
        assert_eq!(patched[0].counts.deaths, Some(0));

        let flags: Vec<_> = patched.iter().map(|r| r.patched).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn test_point_patch_without_match_is_noop() {
        let records = vec![raw(date(2020, 2, 20), "US", Some("Travis, CA"), 5)];
        let before = records.clone();
        let patched = patch_errors(records, &[travis_patch()], &[]);
        assert_eq!(patched, before);
    }

    #[test]
    fn test_point_patch_country_filter() {
        let patch = PointPatch {
            date: date(2020, 3, 1),
            country: Some("Italy".to_string()),
            state: None,
            metric: Metric::Deaths,
            value: 29,
        };
        let mut records = vec![
            raw(date(2020, 3, 1), "Italy", None, 1694),
            raw(date(2020, 3, 1), "France", None, 130),
        ];
        assert_eq!(apply_point_patch(&mut records, &patch), 1);
        assert_eq!(records[0].counts.deaths, Some(29));
        assert_eq!(records[1].counts.deaths, Some(0));
    }

    #[test]
    fn test_state_filter_does_not_match_missing_state() {
        let mut records = vec![raw(date(2020, 2, 21), "US", None, 5)];
        assert_eq!(apply_point_patch(&mut records, &travis_patch()), 0);
    }

    // -------------------------------------------------------------------------
    // BACKFILL TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_backfill_rows_are_appended() {
        let config = ReconcileConfig::builtin().unwrap();
        let records = vec![raw(date(2020, 1, 22), "Mainland China", Some("Hubei"), 444)];
        let patched = patch_errors(records, &[], &config.backfill_rows);

        assert_eq!(patched.len(), 5);
        let hubei: Vec<_> = patched[1..]
            .iter()
            .map(|r| (r.file_date, r.counts.confirmed, r.counts.deaths, r.counts.recovered))
            .collect();
        assert_eq!(
            hubei,
            vec![
                (date(2020, 1, 18), Some(96), Some(4), None),
                (date(2020, 1, 19), Some(132), Some(6), None),
                (date(2020, 1, 20), Some(182), Some(8), None),
                (date(2020, 1, 21), Some(250), Some(11), None),
            ]
        );
        assert!(patched[1..]
            .iter()
            .all(|r| r.file_name.is_empty() && r.last_update.is_none() && !r.patched));
        assert_eq!(patched[1].country, "China");
        assert_eq!(patched[1].state.as_deref(), Some("Hubei"));
    }
}
