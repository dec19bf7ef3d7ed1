//! Source-shape adapters
//!
//! This module provides adapters that parse the platform's raw export JSON
//! and map each recognized shape to canonical [`Workout`] records. The three
//! shapes name the same physical quantities differently; everything
//! shape-specific lives here so the encoders only ever see canonical data.

mod detail;
mod indoor;
mod outdoor;

pub use detail::DetailAdapter;
pub use indoor::IndoorAdapter;
pub use outdoor::OutdoorAdapter;

use crate::clock::Clock;
use crate::error::ExportError;
use crate::types::{metric, Metrics, Source, Workout};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Trait for source-shape adapters
pub trait SourceAdapter {
    /// Parse raw JSON and convert to canonical workouts.
    ///
    /// Batch shapes yield zero or more records; the single-detail shape
    /// yields exactly one. Malformed individual fields are dropped, never
    /// fatal; only invalid JSON or an unrecognizable container is an error.
    fn parse(&self, raw_json: &str, clock: &dyn Clock) -> Result<Vec<Workout>, ExportError>;
}

/// Parent keys (in both observed casings) under which the platform nests its
/// `{name, value}` metric arrays.
const METRIC_PARENT_KEYS: [&str; 4] = ["pr", "Pr", "prs", "Prs"];

/// Best-effort numeric coercion.
///
/// Numbers pass through; strings are trimmed and parsed, falling back to the
/// longest leading numeric prefix. Anything else drops to `None`.
pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<f64>() {
                return Some(v);
            }
            let prefix: String = s
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
                .collect();
            prefix.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Fold a record's nested `{name, value}` metric arrays into a metrics map.
///
/// Unknown metric names pass through verbatim; unparseable values are
/// dropped. A record with no metric array at all yields an empty map.
pub(crate) fn fold_metrics(record: &Value) -> Metrics {
    let mut metrics = Metrics::new();
    for parent in METRIC_PARENT_KEYS {
        let Some(entries) = record.get(parent).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let name = entry
                .get("name")
                .or_else(|| entry.get("Name"))
                .and_then(Value::as_str);
            let value = entry
                .get("value")
                .or_else(|| entry.get("Value"))
                .and_then(coerce_f64);
            if let (Some(name), Some(value)) = (name, value) {
                metrics.insert(name.to_string(), value);
            }
        }
    }
    metrics
}

/// Distance in meters via the fixed fallback chain.
///
/// Order reflects observed field reliability on the platform, not
/// preference; it must not be reordered.
pub(crate) fn derive_distance(metrics: &Metrics) -> Option<f64> {
    metrics
        .get(metric::H_DISTANCE)
        .or_else(|| metrics.get(metric::DISTANCE))
        .or_else(|| metrics.get(metric::DISTANCE_METERS))
        .copied()
        .or_else(|| metrics.get(metric::KM).map(|km| km * 1000.0))
}

/// Vertical meters: `Elevation` before `Floors`
pub(crate) fn derive_vertical(metrics: &Metrics) -> Option<f64> {
    metrics
        .get(metric::ELEVATION)
        .or_else(|| metrics.get(metric::FLOORS))
        .copied()
}

/// Cadence: `AvgSpm` before `Cadence`
pub(crate) fn derive_cadence(metrics: &Metrics) -> Option<f64> {
    metrics
        .get(metric::AVG_SPM)
        .or_else(|| metrics.get(metric::CADENCE))
        .copied()
}

/// Unit-to-meters factor for the single-detail shape's unit-tagged values.
///
/// Unrecognized units yield `None` and the caller passes the raw value
/// through unconverted; table completeness is an explicit non-goal.
pub(crate) fn unit_to_meters(unit: &str) -> Option<f64> {
    match unit.trim().to_ascii_lowercase().as_str() {
        "m" | "meter" | "metre" => Some(1.0),
        "km" => Some(1000.0),
        "mi" | "mile" => Some(1609.344),
        "ft" | "foot" => Some(0.3048),
        _ => None,
    }
}

/// Parse the timestamp formats the platform emits
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// First parseable timestamp among `keys` on `record`
pub(crate) fn first_timestamp(record: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|k| record.get(*k).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

/// First string-or-number identity field among `keys`, stringified
pub(crate) fn first_id(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Activity name heuristic: explicit name field, then the
/// vertical-metric-implies-stairs rule, then a generic per-source label.
pub(crate) fn activity_name(record: &Value, vertical_m: Option<f64>, source: Source) -> String {
    if let Some(name) = first_id(record, &["name", "Name", "title"]) {
        return name;
    }
    if vertical_m.is_some() {
        return "Stair climbing".to_string();
    }
    match source {
        Source::Indoor => "Indoor workout".to_string(),
        Source::Outdoor => "Outdoor workout".to_string(),
    }
}
