//! Label resolution - maps free-text country/state labels to canonical names
//!
//! Country labels go through a literal override table. State labels get a
//! table derived from the data itself: for countries whose early reports mix
//! county detail into the state field, "County, ST" collapses onto the state
//! named by the region code ST. The county granularity of those rows is lost
//! on purpose; keeping it would split the state's series in two.
//!
//! before:
//!   country,             state, deaths,         last_update
//!        US, Orange County, CA,      2, 2020-02-09 01:00:00
//!        US,        California,      1, 2020-02-09 03:00:00
//! after:
//!   country,             state, deaths,         last_update
//!        US,        California,      2, 2020-02-09 01:00:00
//!        US,        California,      1, 2020-02-09 03:00:00

use crate::config::ReconcileConfig;
use crate::model::{RawRecord, ResolvedRecord};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Trailing ", XX" region code, e.g. "Orange County, CA"
static REGION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r", (\w{2})$").expect("Invalid regex"));

/// A deterministic label -> canonical label table; unknown labels pass through
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    map: BTreeMap<String, String>,
}

impl Resolution {
    /// Build a table closed under itself, so resolving twice equals resolving once
    pub fn new(map: BTreeMap<String, String>) -> Self {
        let closed = map
            .iter()
            .map(|(k, v)| (k.clone(), fixed_point(&map, k, v)))
            .collect();
        Self { map: closed }
    }

    pub fn resolve<'a>(&'a self, label: &'a str) -> &'a str {
        self.map.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.map.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn fixed_point(map: &BTreeMap<String, String>, key: &str, value: &str) -> String {
    let mut seen: BTreeSet<&str> = BTreeSet::from([key, value]);
    let mut current = value;
    while let Some(next) = map.get(current) {
        if next == current {
            break;
        }
        if !seen.insert(next.as_str()) {
            warn!("Resolution cycle through '{}', stopping at '{}'", next, current);
            break;
        }
        current = next.as_str();
    }
    current.to_string()
}

/// "Washington, D.C. " -> "Washington, DC"
pub fn clean_label(raw: &str) -> String {
    raw.trim().replace('.', "")
}

pub fn extract_region_code(clean: &str) -> Option<&str> {
    REGION_CODE_RE
        .captures(clean)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn country_resolution(config: &ReconcileConfig) -> Resolution {
    Resolution::new(config.country_overrides.clone())
}

/// Derive the state table from the distinct labels of the quirky countries,
/// then lay the one-off overrides on top.
pub fn state_resolution(records: &[RawRecord], config: &ReconcileConfig) -> Resolution {
    let labels: BTreeSet<&str> = records
        .iter()
        .filter(|r| {
            config
                .state_quirk_countries
                .iter()
                .any(|c| c == r.country.trim())
        })
        .filter_map(|r| r.state.as_deref())
        .map(str::trim)
        .collect();

    let mut map: BTreeMap<String, String> = labels
        .into_iter()
        .map(|raw| {
            let clean = clean_label(raw);
            let resolved = extract_region_code(&clean)
                .and_then(|code| config.region_codes.get(code))
                .cloned()
                .unwrap_or(clean);
            (raw.to_string(), resolved)
        })
        .collect();

    map.extend(
        config
            .state_overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    Resolution::new(map)
}

/// Substitute canonical labels, keeping the published state label for audit
pub fn resolve_labels(records: Vec<RawRecord>, config: &ReconcileConfig) -> Vec<ResolvedRecord> {
    let countries = country_resolution(config);
    let states = state_resolution(&records, config);
    debug!(
        "Resolution tables: {} countries, {} states",
        countries.len(),
        states.len()
    );

    records
        .into_iter()
        .map(|mut record| {
            let state = record.state.as_deref().map(str::trim).map(str::to_string);
            record.country = countries.resolve(record.country.trim()).to_string();
            record.state = state.as_deref().map(|s| states.resolve(s).to_string());
            record.county = record.county.as_deref().map(|c| c.trim().to_string());
            ResolvedRecord {
                record,
                original_state: state,
            }
        })
        .collect()
}
