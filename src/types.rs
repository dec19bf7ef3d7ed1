//! Core types for the fitforge pipeline
//!
//! This module defines the canonical workout record all encoders consume,
//! independent of which source JSON shape produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flat string-keyed numeric summary values for a workout.
///
/// Keys are canonical metric names (see [`metric`]); unknown source names
/// pass through verbatim. Populated once at normalization time.
pub type Metrics = HashMap<String, f64>;

/// Canonical metric key names
pub mod metric {
    pub const AVG_HR: &str = "AvgHr";
    pub const MAX_HR: &str = "MaxHr";
    pub const AVG_POWER: &str = "AvgPower";
    pub const AVG_SPM: &str = "AvgSpm";
    pub const DURATION: &str = "Duration";
    pub const H_DISTANCE: &str = "HDistance";
    pub const DISTANCE: &str = "Distance";
    pub const DISTANCE_METERS: &str = "DistanceMeters";
    pub const KM: &str = "Km";
    pub const ELEVATION: &str = "Elevation";
    pub const FLOORS: &str = "Floors";
    pub const CADENCE: &str = "Cadence";
    pub const MOVE: &str = "Move";
    pub const CALORIES: &str = "Calories";
}

/// Source platform category for provenance and sport classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Indoor,
    Outdoor,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Indoor => "indoor",
            Source::Outdoor => "outdoor",
        }
    }
}

/// One sample in a workout's reconstructed time series.
///
/// `t_sec` is the offset from workout start. Channels absent from a sample
/// stay `None`; they are never zero-filled. Sequences must be sorted
/// ascending by `t_sec` before encoding; encoders sort defensively and
/// duplicates at the same offset are permitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub t_sec: u32,
    pub hr: Option<f64>,
    pub watts: Option<f64>,
    pub cadence: Option<f64>,
    pub vertical_m: Option<f64>,
}

impl SeriesPoint {
    pub fn at(t_sec: u32) -> Self {
        Self {
            t_sec,
            hr: None,
            watts: None,
            cadence: None,
            vertical_m: None,
        }
    }
}

/// Per-channel inclusion flags for export.
///
/// Seeded from which data is actually present (see `options::resolve_export_opts`)
/// and user-toggleable afterward. Toggles affect encoding only, never the
/// normalized record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkoutExportOpts {
    pub include_hr: bool,
    pub include_cadence: bool,
    pub include_power: bool,
    pub include_vertical: bool,
    pub include_distance: bool,
    pub include_calories: bool,
    pub include_notes: bool,
}

/// Canonical workout record.
///
/// Created once per source JSON record during normalization, never merged
/// with another workout. `raw` keeps the original payload solely for
/// alternate start-time extraction at encode time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub uid: String,
    pub id: String,
    pub source: Source,
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<u32>,
    pub calories: Option<f64>,
    pub distance_m: Option<f64>,
    pub vertical_m: Option<f64>,
    pub cadence_spm: Option<f64>,
    pub metrics: Metrics,
    pub series: Option<Vec<SeriesPoint>>,
    pub raw: serde_json::Value,
    pub export_opts: WorkoutExportOpts,
}

impl Workout {
    pub fn new(uid: impl Into<String>, id: impl Into<String>, source: Source) -> Self {
        Self {
            uid: uid.into(),
            id: id.into(),
            source,
            name: String::new(),
            started_at: None,
            duration_sec: None,
            calories: None,
            distance_m: None,
            vertical_m: None,
            cadence_spm: None,
            metrics: Metrics::new(),
            series: None,
            raw: serde_json::Value::Null,
            export_opts: WorkoutExportOpts::default(),
        }
    }

    /// Look up a canonical metric by name
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Declared duration, treating absence as zero
    pub fn duration_or_zero(&self) -> u32 {
        self.duration_sec.unwrap_or(0)
    }

    /// Average HR metric, falling back to max HR
    pub fn avg_or_max_hr(&self) -> Option<f64> {
        self.metric(metric::AVG_HR).or_else(|| self.metric(metric::MAX_HR))
    }

    /// Series points, or an empty slice when none were reconstructed
    pub fn series_points(&self) -> &[SeriesPoint] {
        self.series.as_deref().unwrap_or(&[])
    }
}
