//! The 15 built-in merge strategies plus the custom-function escape
//! hatch. Each is a pure function `(values, source_records, options) ->
//! Option<value>`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::record::SourceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NullHandling {
    Skip,
    Include,
    PreferNull,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyOptions {
    pub null_handling: Option<NullHandling>,
    pub remove_duplicates: bool,
    pub date_field: Option<String>,
}

pub type CustomStrategyFn =
    Arc<dyn Fn(&[Option<JsonValue>], &[SourceRecord]) -> Option<JsonValue> + Send + Sync>;

/// A tagged variant: a named built-in, or a caller-supplied function.
#[derive(Clone)]
pub enum StrategyKind {
    PreferFirst,
    PreferLast,
    PreferNonNull,
    PreferNewer,
    PreferOlder,
    PreferLonger,
    PreferShorter,
    Concatenate,
    Union,
    MostFrequent,
    Average,
    Sum,
    Min,
    Max,
    Custom(CustomStrategyFn),
}

impl std::fmt::Debug for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::PreferFirst => "preferFirst",
            StrategyKind::PreferLast => "preferLast",
            StrategyKind::PreferNonNull => "preferNonNull",
            StrategyKind::PreferNewer => "preferNewer",
            StrategyKind::PreferOlder => "preferOlder",
            StrategyKind::PreferLonger => "preferLonger",
            StrategyKind::PreferShorter => "preferShorter",
            StrategyKind::Concatenate => "concatenate",
            StrategyKind::Union => "union",
            StrategyKind::MostFrequent => "mostFrequent",
            StrategyKind::Average => "average",
            StrategyKind::Sum => "sum",
            StrategyKind::Min => "min",
            StrategyKind::Max => "max",
            StrategyKind::Custom(_) => "custom",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            StrategyKind::Average | StrategyKind::Sum | StrategyKind::Min | StrategyKind::Max
        )
    }
}

fn is_null_or_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_str_len(value: &JsonValue) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

fn source_timestamp(record: &SourceRecord, date_field: Option<&str>) -> Option<DateTime<Utc>> {
    match date_field {
        Some(field) => record
            .record
            .get(field)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        None => Some(record.updated_at),
    }
}

/// Apply `kind` to `values` (one per source record, `None` when absent),
/// returning the golden value, or `None` if no value can be produced.
pub fn apply(
    kind: &StrategyKind,
    values: &[Option<JsonValue>],
    sources: &[SourceRecord],
    options: &StrategyOptions,
) -> Option<JsonValue> {
    match kind {
        StrategyKind::PreferFirst => prefer_in_order(values, options, false),
        StrategyKind::PreferLast => prefer_in_order(values, options, true),
        StrategyKind::PreferNonNull => values
            .iter()
            .find(|v| v.as_ref().is_some_and(|v| !is_null_or_blank(v)))
            .cloned()
            .flatten(),
        StrategyKind::PreferNewer => prefer_by_timestamp(values, sources, options, true),
        StrategyKind::PreferOlder => prefer_by_timestamp(values, sources, options, false),
        StrategyKind::PreferLonger => prefer_by_length(values, true),
        StrategyKind::PreferShorter => prefer_by_length(values, false),
        StrategyKind::Concatenate => Some(concatenate(values, options.remove_duplicates)),
        StrategyKind::Union => Some(union(values)),
        StrategyKind::MostFrequent => most_frequent(values),
        StrategyKind::Average => numeric_aggregate(values, NumericOp::Average),
        StrategyKind::Sum => numeric_aggregate(values, NumericOp::Sum),
        StrategyKind::Min => numeric_aggregate(values, NumericOp::Min),
        StrategyKind::Max => numeric_aggregate(values, NumericOp::Max),
        StrategyKind::Custom(f) => f(values, sources),
    }
}

fn prefer_in_order(values: &[Option<JsonValue>], options: &StrategyOptions, reverse: bool) -> Option<JsonValue> {
    let ordered: Vec<&Option<JsonValue>> = if reverse {
        values.iter().rev().collect()
    } else {
        values.iter().collect()
    };
    let handling = options.null_handling.unwrap_or(NullHandling::Skip);
    match handling {
        NullHandling::Include => ordered.into_iter().find_map(|v| v.clone()),
        NullHandling::Skip => ordered
            .into_iter()
            .filter_map(|v| v.clone())
            .find(|v| !v.is_null()),
        NullHandling::PreferNull => {
            if let Some(null_val) = ordered.iter().find_map(|v| v.as_ref().filter(|x| x.is_null())) {
                return Some(null_val.clone());
            }
            ordered
                .into_iter()
                .filter_map(|v| v.clone())
                .find(|v| !v.is_null())
        }
    }
}

fn prefer_by_timestamp(
    values: &[Option<JsonValue>],
    sources: &[SourceRecord],
    options: &StrategyOptions,
    newer: bool,
) -> Option<JsonValue> {
    let mut best: Option<(DateTime<Utc>, usize)> = None;
    for (idx, value) in values.iter().enumerate() {
        if value.is_none() {
            continue;
        }
        let Some(ts) = sources.get(idx).and_then(|s| source_timestamp(s, options.date_field.as_deref())) else {
            continue;
        };
        best = match best {
            None => Some((ts, idx)),
            Some((best_ts, _)) if (newer && ts > best_ts) || (!newer && ts < best_ts) => Some((ts, idx)),
            existing => existing,
        };
    }
    best.and_then(|(_, idx)| values[idx].clone())
}

fn prefer_by_length(values: &[Option<JsonValue>], longer: bool) -> Option<JsonValue> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        let Some(len) = as_str_len(v) else { continue };
        if !longer && len == 0 {
            continue; // preferShorter ignores empty strings
        }
        best = match best {
            None => Some((len, idx)),
            Some((best_len, _)) if (longer && len > best_len) || (!longer && len < best_len) => {
                Some((len, idx))
            }
            existing => existing,
        };
    }
    best.and_then(|(_, idx)| values[idx].clone())
}

fn flatten_values(values: &[Option<JsonValue>]) -> Vec<JsonValue> {
    let mut out = Vec::new();
    for value in values.iter().flatten() {
        match value {
            JsonValue::Array(items) => out.extend(items.iter().filter(|v| !v.is_null()).cloned()),
            JsonValue::Null => {}
            other => out.push(other.clone()),
        }
    }
    out
}

fn concatenate(values: &[Option<JsonValue>], remove_duplicates: bool) -> JsonValue {
    let mut flat = flatten_values(values);
    if remove_duplicates {
        dedup_preserve_order(&mut flat);
    }
    JsonValue::Array(flat)
}

fn union(values: &[Option<JsonValue>]) -> JsonValue {
    let mut flat = flatten_values(values);
    dedup_preserve_order(&mut flat);
    JsonValue::Array(flat)
}

fn dedup_preserve_order(items: &mut Vec<JsonValue>) {
    let mut seen: Vec<JsonValue> = Vec::new();
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}

fn most_frequent(values: &[Option<JsonValue>]) -> Option<JsonValue> {
    let present: Vec<&JsonValue> = values.iter().flatten().collect();
    let mut counts: Vec<(JsonValue, usize)> = Vec::new();
    for value in &present {
        if let Some(entry) = counts.iter_mut().find(|(v, _)| v == *value) {
            entry.1 += 1;
        } else {
            counts.push(((*value).clone(), 1));
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(value, _)| value)
}

enum NumericOp {
    Average,
    Sum,
    Min,
    Max,
}

fn numeric_aggregate(values: &[Option<JsonValue>], op: NumericOp) -> Option<JsonValue> {
    let numbers: Vec<f64> = values
        .iter()
        .flatten()
        .filter_map(|v| v.as_f64())
        .collect();
    if numbers.is_empty() {
        return None;
    }
    let result = match op {
        NumericOp::Average => numbers.iter().sum::<f64>() / numbers.len() as f64,
        NumericOp::Sum => numbers.iter().sum::<f64>(),
        NumericOp::Min => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
        NumericOp::Max => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    };
    serde_json::Number::from_f64(result).map(JsonValue::Number)
}
