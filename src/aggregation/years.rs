use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::amounts::amount_from_json;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digit regex"));

static SHORT_FY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^fy[\s\-_]*(\d{2})$").expect("Invalid fiscal year regex"));

const LATEST_LABELS: &[&str] = &["latest", "latest_year", "current_year", "year_end"];
const PREVIOUS_LABELS: &[&str] = &["previous", "previous_year", "prev_year", "prev_year_end"];

fn in_range(year: i32) -> Option<i32> {
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

/// Map a fiscal-year label to the calendar year it reports on.
///
/// `reference_year` resolves relative labels such as `latest` or
/// `previous_year`; without it those labels stay unresolved.
pub fn normalize_year_key(label: &str, reference_year: Option<i32>) -> Option<i32> {
    let lowered = label.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let relative = lowered.replace([' ', '-'], "_");
    if LATEST_LABELS.contains(&relative.as_str()) {
        return reference_year.and_then(in_range);
    }
    if PREVIOUS_LABELS.contains(&relative.as_str()) {
        return reference_year.and_then(|y| in_range(y - 1));
    }

    if let Some(caps) = SHORT_FY.captures(&lowered) {
        let yy: i32 = caps[1].parse().ok()?;
        return in_range(2000 + yy);
    }

    let runs: Vec<_> = DIGIT_RUN.find_iter(&lowered).collect();

    // "2022/23", "2022-23", "2022_23" report on the end year.
    for pair in runs.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if start.as_str().len() != 4 || end.as_str().len() != 2 {
            continue;
        }
        let between = &lowered[start.end()..end.start()];
        let is_split = between.trim().len() == 1 && matches!(between.trim(), "/" | "-" | "_");
        if !is_split {
            continue;
        }
        let (Ok(first), Ok(yy)) = (start.as_str().parse::<i32>(), end.as_str().parse::<i32>())
        else {
            continue;
        };
        if yy == (first + 1) % 100 {
            return in_range(first + 1);
        }
    }

    runs.iter()
        .filter(|m| m.as_str().len() == 4)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter_map(in_range)
        .max()
}

/// Year-keyed financial figures, ordered by year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialSeries(BTreeMap<i32, f64>);

impl FinancialSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, value: f64) {
        self.0.insert(year, value);
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        self.0.get(&year).copied()
    }

    pub fn latest(&self) -> Option<(i32, f64)> {
        self.0.iter().next_back().map(|(y, v)| (*y, *v))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.0.iter().map(|(y, v)| (*y, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values from `newer` replace existing ones for the same year.
    pub fn merge(&mut self, newer: &FinancialSeries) {
        for (year, value) in newer.iter() {
            self.0.insert(year, value);
        }
    }

    /// JSON object keyed by the year as a string, oldest first.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(y, v)| (y.to_string(), Value::from(*v)))
            .collect();
        Value::Object(map)
    }
}

impl FromIterator<(i32, f64)> for FinancialSeries {
    fn from_iter<T: IntoIterator<Item = (i32, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesNormalization {
    pub series: FinancialSeries,
    /// Labels that could not be mapped to a year.
    pub dropped: Vec<String>,
}

/// Re-key a stored `{label: amount}` object by calendar year.
///
/// When several labels land on the same year the one appearing later in the
/// object wins. Blank amounts are skipped without being reported.
pub fn normalize_series(raw: &Value, reference_year: Option<i32>) -> SeriesNormalization {
    let mut out = SeriesNormalization::default();
    let Some(object) = raw.as_object() else {
        return out;
    };

    for (label, value) in object {
        let Some(year) = normalize_year_key(label, reference_year) else {
            out.dropped.push(label.clone());
            continue;
        };
        if let Some(amount) = amount_from_json(value) {
            out.series.insert(year, amount);
        }
    }
    out
}
