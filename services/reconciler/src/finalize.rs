//! Series finalization - turns snapshot rows into one clean cumulative series per place
//!
//! Steps run per place, in this order, each switched on by the source:
//! 1. shift dates by one report (time-zone shifted feeds)
//! 2. cumulative sum (feeds publishing daily deltas)
//! 3. clamp regressions to the running maximum, except on patched rows
//! 4. drop a stale last report
//! 5. resample to a gap-free daily calendar

use crate::model::{Metric, Place, SeriesEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Metrics that must never decrease
const CUMULATIVE: [Metric; 2] = [Metric::Confirmed, Metric::Deaths];

#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeOptions {
    pub shift_dates: bool,
    pub cumulative_sum: bool,
    pub clamp_regressions: bool,
    pub drop_stale_tail: bool,
    pub resample_daily: bool,
}

/// Each entry takes the date of the report before it; the first report of
/// the place has no predecessor and is dropped.
pub fn shift_dates(series: Vec<SeriesEntry>) -> Vec<SeriesEntry> {
    let dates: Vec<NaiveDate> = series.iter().map(|e| e.date).collect();
    series
        .into_iter()
        .skip(1)
        .zip(dates)
        .map(|(mut entry, previous)| {
            entry.date = previous;
            entry
        })
        .collect()
}

/// Running sum per metric; missing values stay missing and do not reset the sum
pub fn cumulative_sum(mut series: Vec<SeriesEntry>) -> Vec<SeriesEntry> {
    for metric in Metric::ALL {
        let mut running = 0i64;
        for entry in series.iter_mut() {
            if let Some(value) = entry.counts.get_mut(metric) {
                running = running.saturating_add(*value);
                *value = running;
            }
        }
    }
    series
}

/// Patched rows keep their value and become the new floor of their place
pub fn clamp_regressions(mut series: Vec<SeriesEntry>) -> Vec<SeriesEntry> {
    for metric in CUMULATIVE {
        let mut floor: Option<i64> = None;
        for entry in series.iter_mut() {
            let Some(value) = entry.counts.get_mut(metric) else {
                continue;
            };
            if entry.patched {
                floor = Some(*value);
                continue;
            }
            match floor {
                Some(f) if *value < f => *value = f,
                _ => floor = Some(*value),
            }
        }
    }
    series
}

fn same(a: Option<i64>, b: Option<i64>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// Drop the last report when it repeats the one before it in both confirmed
/// and deaths. Only the very last row is inspected: a plateau in the middle
/// of a series is a real zero-growth day.
pub fn drop_stale_tail(mut series: Vec<SeriesEntry>) -> Vec<SeriesEntry> {
    if let [.., previous, last] = series.as_slice() {
        if same(previous.counts.confirmed, last.counts.confirmed)
            && same(previous.counts.deaths, last.counts.deaths)
        {
            series.pop();
        }
    }
    series
}

/// Linear interpolation over missing values; trailing gaps take the last
/// known value, leading gaps stay missing.
pub fn interpolate(values: &mut [Option<i64>]) {
    let mut last_known: Option<usize> = None;
    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };
        if let Some(start) = last_known {
            if i - start > 1 {
                let from = values[start].unwrap_or(current) as f64;
                let span = (i - start) as f64;
                for (step, slot) in values[start + 1..i].iter_mut().enumerate() {
                    let fraction = (step + 1) as f64 / span;
                    *slot = Some((from + (current as f64 - from) * fraction).round() as i64);
                }
            }
        }
        last_known = Some(i);
    }
    if let Some(start) = last_known {
        let tail = values[start];
        for slot in values[start + 1..].iter_mut() {
            *slot = tail;
        }
    }
}

/// One row per calendar day between the first and last report. Gap days
/// repeat the previous report; remaining holes are interpolated.
pub fn resample_daily(series: Vec<SeriesEntry>) -> Vec<SeriesEntry> {
    // the last report of a day wins
    let by_day: BTreeMap<NaiveDate, SeriesEntry> =
        series.into_iter().map(|e| (e.date, e)).collect();
    let (Some(first), Some(last)) = (
        by_day.keys().next().copied(),
        by_day.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut filled: Vec<SeriesEntry> = Vec::new();
    for day in first.iter_days().take_while(|d| *d <= last) {
        match by_day.get(&day) {
            Some(entry) => filled.push(entry.clone()),
            None => {
                if let Some(previous) = filled.last() {
                    let mut copy = previous.clone();
                    copy.date = day;
                    copy.patched = false;
                    filled.push(copy);
                }
            }
        }
    }

    for metric in Metric::ALL {
        let mut values: Vec<Option<i64>> = filled.iter().map(|e| e.counts.get(metric)).collect();
        interpolate(&mut values);
        for (entry, value) in filled.iter_mut().zip(values) {
            *entry.counts.get_mut(metric) = value;
        }
    }
    filled
}

fn finalize_place(mut series: Vec<SeriesEntry>, options: &FinalizeOptions) -> Vec<SeriesEntry> {
    series.sort_by_key(|e| e.date);
    if options.shift_dates {
        series = shift_dates(series);
    }
    if options.cumulative_sum {
        series = cumulative_sum(series);
    }
    if options.clamp_regressions {
        series = clamp_regressions(series);
    }
    if options.drop_stale_tail {
        series = drop_stale_tail(series);
    }
    if options.resample_daily {
        series = resample_daily(series);
    }
    series
}

/// Run the enabled steps for every place. Output is ordered by (place, date).
pub fn finalize(entries: Vec<SeriesEntry>, options: &FinalizeOptions) -> Vec<SeriesEntry> {
    let mut by_place: BTreeMap<Place, Vec<SeriesEntry>> = BTreeMap::new();
    for entry in entries {
        by_place.entry(entry.place.clone()).or_default().push(entry);
    }
    debug!("Finalizing {} places with {:?}", by_place.len(), options);

    by_place
        .into_values()
        .flat_map(|series| finalize_place(series, options))
        .collect()
}

/// True when confirmed and deaths never decrease within a place, outside patched rows
pub fn is_monotonic(series: &[SeriesEntry]) -> bool {
    series.windows(2).all(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        a.place != b.place
            || b.patched
            || CUMULATIVE
                .iter()
                .all(|m| match (a.counts.get(*m), b.counts.get(*m)) {
                    (Some(x), Some(y)) => y >= x,
                    _ => true,
                })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Counts;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn entry(place: &str, day: NaiveDate, confirmed: Option<i64>, deaths: Option<i64>) -> SeriesEntry {
        SeriesEntry {
            date: day,
            place: Place::country(place),
            counts: Counts::new(confirmed, deaths, None),
            last_update: None,
            patched: false,
        }
    }

    fn confirmed(series: &[SeriesEntry]) -> Vec<Option<i64>> {
        series.iter().map(|e| e.counts.confirmed).collect()
    }

    fn dates(series: &[SeriesEntry]) -> Vec<NaiveDate> {
        series.iter().map(|e| e.date).collect()
    }

    // -------------------------------------------------------------------------
    // DATE SHIFT TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_shift_dates_drops_first_report() {
        let series = vec![
            entry("Italy", date(3, 1), Some(5), Some(0)),
            entry("Italy", date(3, 2), Some(7), Some(1)),
            entry("Italy", date(3, 4), Some(9), Some(1)),
        ];
        let shifted = shift_dates(series);
        assert_eq!(dates(&shifted), vec![date(3, 1), date(3, 2)]);
        assert_eq!(confirmed(&shifted), vec![Some(7), Some(9)]);
    }

    #[test]
    fn test_shift_dates_single_report_vanishes() {
        assert!(shift_dates(vec![entry("Italy", date(3, 1), Some(5), None)]).is_empty());
        assert!(shift_dates(Vec::new()).is_empty());
    }

    // -------------------------------------------------------------------------
    // CUMULATIVE SUM TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_cumulative_sum_skips_missing() {
        let series = vec![
            entry("Italy", date(3, 1), Some(2), Some(0)),
            entry("Italy", date(3, 2), None, Some(1)),
            entry("Italy", date(3, 3), Some(3), Some(2)),
        ];
        let summed = cumulative_sum(series);
        assert_eq!(confirmed(&summed), vec![Some(2), None, Some(5)]);
        let deaths: Vec<_> = summed.iter().map(|e| e.counts.deaths).collect();
        assert_eq!(deaths, vec![Some(0), Some(1), Some(3)]);
    }

    // -------------------------------------------------------------------------
    // CLAMP TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_clamp_carries_running_maximum() {
        let series = vec![
            entry("US", date(3, 1), Some(10), Some(1)),
            entry("US", date(3, 2), Some(8), Some(2)),
            entry("US", date(3, 3), Some(12), Some(1)),
        ];
        let clamped = clamp_regressions(series);
        assert_eq!(confirmed(&clamped), vec![Some(10), Some(10), Some(12)]);
        let deaths: Vec<_> = clamped.iter().map(|e| e.counts.deaths).collect();
        assert_eq!(deaths, vec![Some(1), Some(2), Some(2)]);
    }

    #[test]
    fn test_clamp_restarts_at_patched_row() {
        let mut corrected = entry("US", date(2, 21), Some(0), Some(0));
        corrected.patched = true;
        let series = vec![
            entry("US", date(2, 20), Some(5), Some(0)),
            corrected,
            entry("US", date(2, 22), Some(1), Some(0)),
        ];
        let mut clamped = clamp_regressions(series);
        assert_eq!(confirmed(&clamped), vec![Some(5), Some(0), Some(1)]);
        assert!(is_monotonic(&clamped));

        clamped[1].patched = false;
        assert!(!is_monotonic(&clamped));
    }

    #[test]
    fn test_unpatched_row_on_a_patched_date_is_clamped() {
        // another place carries a correction on 2/21; Italy does not
        let series = vec![
            entry("Italy", date(2, 20), Some(10), Some(1)),
            entry("Italy", date(2, 21), Some(5), Some(1)),
            entry("Italy", date(2, 22), Some(6), Some(1)),
        ];
        let clamped = clamp_regressions(series);
        assert_eq!(confirmed(&clamped), vec![Some(10), Some(10), Some(10)]);
        assert!(is_monotonic(&clamped));
    }

    #[test]
    fn test_cumulative_sum_saturates() {
        let series = vec![
            entry("P", date(3, 1), Some(i64::MAX), Some(0)),
            entry("P", date(3, 2), Some(1), Some(0)),
        ];
        assert_eq!(confirmed(&cumulative_sum(series)), vec![Some(i64::MAX), Some(i64::MAX)]);
    }

    #[test]
    fn test_gap_fill_copies_are_not_patched() {
        let mut corrected = entry("P", date(3, 1), Some(0), Some(0));
        corrected.patched = true;
        let series = vec![corrected, entry("P", date(3, 3), Some(2), Some(0))];
        let flags: Vec<_> = resample_daily(series).iter().map(|e| e.patched).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    // -------------------------------------------------------------------------
    // STALE TAIL TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_stale_last_report_is_dropped() {
        let series = vec![
            entry("P", date(3, 1), Some(90), Some(4)),
            entry("P", date(3, 2), Some(100), Some(5)),
            entry("P", date(3, 3), Some(100), Some(5)),
        ];
        let out = drop_stale_tail(series);
        assert_eq!(dates(&out), vec![date(3, 1), date(3, 2)]);
    }

    #[test]
    fn test_stale_plateau_mid_series_is_kept() {
        let series = vec![
            entry("P", date(3, 1), Some(100), Some(5)),
            entry("P", date(3, 2), Some(100), Some(5)),
            entry("P", date(3, 3), Some(110), Some(6)),
        ];
        let out = drop_stale_tail(series.clone());
        assert_eq!(out, series);
    }

    #[test]
    fn test_only_one_stale_row_is_dropped() {
        let series = vec![
            entry("P", date(3, 1), Some(100), Some(5)),
            entry("P", date(3, 2), Some(100), Some(5)),
            entry("P", date(3, 3), Some(100), Some(5)),
        ];
        assert_eq!(drop_stale_tail(series).len(), 2);
    }

    #[test]
    fn test_tail_with_changed_deaths_is_kept() {
        let series = vec![
            entry("P", date(3, 1), Some(100), Some(5)),
            entry("P", date(3, 2), Some(100), Some(6)),
        ];
        assert_eq!(drop_stale_tail(series).len(), 2);
    }

    #[test]
    fn test_missing_values_never_count_as_stale() {
        let series = vec![
            entry("P", date(3, 1), Some(100), None),
            entry("P", date(3, 2), Some(100), None),
        ];
        assert_eq!(drop_stale_tail(series).len(), 2);
    }

    // -------------------------------------------------------------------------
    // RESAMPLE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_interpolate() {
        let mut values = vec![None, Some(10), None, None, Some(16), None];
        interpolate(&mut values);
        assert_eq!(values, vec![None, Some(10), Some(12), Some(14), Some(16), Some(16)]);
    }

    #[test]
    fn test_resample_fills_gap_days_forward() {
        let series = vec![
            entry("P", date(3, 1), Some(10), Some(1)),
            entry("P", date(3, 4), Some(20), Some(2)),
        ];
        let out = resample_daily(series);
        assert_eq!(dates(&out), vec![date(3, 1), date(3, 2), date(3, 3), date(3, 4)]);
        assert_eq!(confirmed(&out), vec![Some(10), Some(10), Some(10), Some(20)]);
    }

    #[test]
    fn test_resample_interpolates_reported_holes() {
        let series = vec![
            entry("P", date(3, 1), Some(10), Some(1)),
            entry("P", date(3, 2), None, Some(1)),
            entry("P", date(3, 3), Some(20), Some(2)),
        ];
        let out = resample_daily(series);
        assert_eq!(confirmed(&out), vec![Some(10), Some(15), Some(20)]);
    }

    #[test]
    fn test_resample_last_report_of_day_wins() {
        let series = vec![
            entry("P", date(3, 1), Some(10), Some(1)),
            entry("P", date(3, 1), Some(11), Some(1)),
        ];
        let out = resample_daily(series);
        assert_eq!(confirmed(&out), vec![Some(11)]);
    }

    // -------------------------------------------------------------------------
    // FULL FINALIZE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_finalize_has_no_gaps_and_is_monotonic() {
        let options = FinalizeOptions {
            clamp_regressions: true,
            drop_stale_tail: true,
            resample_daily: true,
            ..Default::default()
        };
        let entries = vec![
            entry("B", date(3, 5), Some(3), Some(0)),
            entry("A", date(3, 1), Some(1), Some(0)),
            entry("A", date(3, 3), Some(4), Some(1)),
            entry("A", date(3, 4), Some(2), Some(1)),
            entry("A", date(3, 7), Some(9), Some(2)),
            entry("B", date(3, 2), Some(1), Some(0)),
        ];
        let out = finalize(entries, &options);

        for place in ["A", "B"] {
            let series: Vec<_> = out.iter().filter(|e| e.place.country == place).cloned().collect();
            assert!(is_monotonic(&series), "place {place}");
            for pair in series.windows(2) {
                assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date), "place {place}");
            }
        }
        let a: Vec<_> = out.iter().filter(|e| e.place.country == "A").collect();
        assert_eq!(a.len(), 7);
        assert_eq!(a[3].counts.confirmed, Some(4)); // clamped regression on 3/4
    }

    #[test]
    fn test_finalize_delta_feed() {
        let options = FinalizeOptions {
            shift_dates: true,
            cumulative_sum: true,
            drop_stale_tail: true,
            resample_daily: true,
            ..Default::default()
        };
        // daily deltas reported the morning after
        let entries = vec![
            entry("Italy", date(3, 1), Some(0), Some(0)),
            entry("Italy", date(3, 2), Some(5), Some(1)),
            entry("Italy", date(3, 3), Some(3), Some(0)),
            entry("Italy", date(3, 5), Some(4), Some(1)),
            entry("Italy", date(3, 6), Some(0), Some(0)),
        ];
        let out = finalize(entries, &options);
        assert_eq!(dates(&out), vec![date(3, 1), date(3, 2), date(3, 3)]);
        assert_eq!(confirmed(&out), vec![Some(5), Some(8), Some(12)]);
    }
}
