//! Series normalization
//!
//! Aligns the parallel arrays of each named series to a common length.
//! - Every array is clamped to the most recent `MAX_POINTS` elements
//! - The primary array decides the series length
//! - Longer arrays lose their oldest elements, shorter ones are backfilled
//!   at the front with defaults
//!
//! Trailing (most recent) values are never fabricated.

use crate::coerce::{coerce_number, coerce_string};
use crate::types::{
    NetworthSeries, StakeSeries, WithdrawalSeries, MAX_POINTS, STAKE_LABEL_PLACEHOLDER,
    STAKE_TYPE_PLACEHOLDER, WITHDRAWAL_LABEL_PLACEHOLDER,
};
use serde_json::Value;

/// Maximum characters kept per series label
pub const MAX_LABEL_CHARS: usize = 80;

/// Maximum characters kept per stake type
pub const MAX_TYPE_CHARS: usize = 32;

/// Normalizer for the three snapshot series
pub struct SeriesNormalizer;

impl SeriesNormalizer {
    /// Normalize the `stake` section
    pub fn stake(section: Option<&Value>) -> StakeSeries {
        let data = number_array(field(section, "data"));
        let n = data.len();

        let labels = string_array(field(section, "labels"), MAX_LABEL_CHARS);
        let moves = number_array(field(section, "moves"));
        let types = string_array(field(section, "types"), MAX_TYPE_CHARS);

        StakeSeries {
            labels: align(labels, n, STAKE_LABEL_PLACEHOLDER.to_string()),
            data,
            moves: align(moves, n, 0.0),
            types: align(types, n, STAKE_TYPE_PLACEHOLDER.to_string()),
        }
    }

    /// Normalize the `withdrawals` section
    pub fn withdrawals(section: Option<&Value>) -> WithdrawalSeries {
        let values = number_array(field(section, "values"));
        let n = values.len();

        let labels = string_array(field(section, "labels"), MAX_LABEL_CHARS);
        let times = number_array(field(section, "times"));

        WithdrawalSeries {
            labels: align(labels, n, WITHDRAWAL_LABEL_PLACEHOLDER.to_string()),
            values,
            times: align(times, n, 0.0),
        }
    }

    /// Normalize the `networth` section
    pub fn networth(section: Option<&Value>) -> NetworthSeries {
        let times = number_array(field(section, "times"));
        let n = times.len();

        let usd = number_array(field(section, "usd"));
        let inj = number_array(field(section, "inj"));

        NetworthSeries {
            times,
            usd: align(usd, n, 0.0),
            inj: align(inj, n, 0.0),
        }
    }
}

fn field<'a>(section: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    section.and_then(|s| s.get(name))
}

/// Elements of a JSON array, limited to the last `MAX_POINTS`; non-arrays are empty
fn recent_elements(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => &items[items.len().saturating_sub(MAX_POINTS)..],
        _ => &[],
    }
}

fn number_array(value: Option<&Value>) -> Vec<f64> {
    recent_elements(value)
        .iter()
        .map(|v| coerce_number(Some(v)))
        .collect()
}

fn string_array(value: Option<&Value>, max_len: usize) -> Vec<String> {
    recent_elements(value)
        .iter()
        .map(|v| coerce_string(Some(v), max_len))
        .collect()
}

/// Bring `items` to exactly `n` elements, keeping the most recent ones and
/// left-padding with `fill`.
fn align<T: Clone>(mut items: Vec<T>, n: usize, fill: T) -> Vec<T> {
    if items.len() > n {
        items.drain(..items.len() - n);
        return items;
    }

    let missing = n - items.len();
    if missing == 0 {
        return items;
    }
    let mut padded = Vec::with_capacity(n);
    padded.resize(missing, fill);
    padded.extend(items);
    padded
}
