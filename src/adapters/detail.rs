//! Single-workout detail adapter
//!
//! The detail page carries the dense analytics payload: a descriptor table
//! mapping sample-array indices to channel names, a sample array of
//! `{t, vs: [..]}` rows, and a sparse heart-rate anchor array. This adapter
//! reconstructs the per-sample series, interpolating heart rate onto every
//! sample offset, and derives the aggregate metrics the FIT lap/session
//! summaries need.

use crate::clock::Clock;
use crate::error::ExportError;
use crate::options::resolve_export_opts;
use crate::series::{sort_points, HrAnchors};
use crate::types::{metric, Metrics, SeriesPoint, Source, Workout};
use serde_json::Value;

use super::{
    activity_name, coerce_f64, derive_cadence, derive_distance, derive_vertical, first_id,
    first_timestamp, fold_metrics, unit_to_meters, SourceAdapter,
};

/// Single-detail adapter; yields exactly one workout
pub struct DetailAdapter;

impl SourceAdapter for DetailAdapter {
    fn parse(&self, raw_json: &str, clock: &dyn Clock) -> Result<Vec<Workout>, ExportError> {
        let payload: Value = serde_json::from_str(raw_json)?;
        let root = match payload.get("data") {
            Some(data) if data.is_object() => data,
            _ => &payload,
        };

        let analytics = root.get("analitics").or_else(|| root.get("analytics"));
        let mut metrics = fold_metrics(root);
        merge_summary_table(root, &mut metrics);

        if analytics.is_none() && metrics.is_empty() {
            return Err(ExportError::SchemaMismatch(
                "detail payload has no analytics or summary data".to_string(),
            ));
        }

        let reconstruction = analytics.map(reconstruct_series).unwrap_or_default();
        let Reconstruction {
            points,
            max_distance_m,
            max_vertical_m,
        } = reconstruction;

        if !points.is_empty() {
            fill_series_aggregates(&points, &mut metrics);
        }

        let uid = first_id(root, &["uid", "Uid"]).unwrap_or_else(|| "detail".to_string());
        let id = first_id(root, &["id", "Id"]).unwrap_or_else(|| uid.clone());

        let mut workout = Workout::new(uid, id, Source::Indoor);
        workout.started_at = first_timestamp(root, &["startTime", "startedAt", "started_at"])
            .or_else(|| first_timestamp(root, &["performedDate", "date", "performed"]))
            .or_else(|| Some(clock.now()));
        workout.duration_sec = metrics
            .get(metric::DURATION)
            .map(|d| d.max(0.0) as u32)
            .or_else(|| points.last().map(|p| p.t_sec));
        workout.calories = metrics.get(metric::CALORIES).copied();
        workout.distance_m = derive_distance(&metrics).or(max_distance_m);
        workout.vertical_m = derive_vertical(&metrics).or(max_vertical_m);
        workout.cadence_spm = derive_cadence(&metrics);
        workout.name = activity_name(root, workout.vertical_m, Source::Indoor);
        workout.metrics = metrics;
        workout.series = if points.is_empty() { None } else { Some(points) };
        workout.raw = root.clone();
        workout.export_opts = resolve_export_opts(&workout);
        Ok(vec![workout])
    }
}

/// Summary-property array parallel to the analytics payload.
///
/// Entries are `{name, value}` with an optional unit tag; recognized units
/// convert to meters, unrecognized values pass through unconverted.
fn merge_summary_table(root: &Value, metrics: &mut Metrics) {
    let Some(entries) = root.get("data").and_then(Value::as_array) else {
        return;
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
        let (Some(name), Some(value)) = (name, value) else {
            continue;
        };
        let factor = entry
            .get("unit")
            .and_then(Value::as_str)
            .and_then(unit_to_meters)
            .unwrap_or(1.0);
        metrics.insert(name.to_string(), value * factor);
    }
}

/// What a descriptor index contributes to each sample
#[derive(Debug, Clone, Copy, PartialEq)]
enum Channel {
    Watts,
    Cadence,
    /// Vertical reading, unit-converted to meters
    Vertical(f64),
    /// Distance is tracked as a running max across samples, not per point
    Distance(f64),
    Ignore,
}

fn classify_channel(name: &str, unit: Option<&str>) -> Channel {
    let factor = unit.and_then(unit_to_meters).unwrap_or(1.0);
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "power" | "runningpower" => Channel::Watts,
        "spm" | "rpm" | "cadence" | "runningcadence" => Channel::Cadence,
        "floors" | "elevation" => Channel::Vertical(factor),
        "hdistance" | "distance" => Channel::Distance(factor),
        _ => Channel::Ignore,
    }
}

#[derive(Debug, Default)]
struct Reconstruction {
    points: Vec<SeriesPoint>,
    max_distance_m: Option<f64>,
    max_vertical_m: Option<f64>,
}

fn reconstruct_series(analytics: &Value) -> Reconstruction {
    let channels: Vec<Channel> = analytics
        .get("descriptor")
        .and_then(Value::as_array)
        .map(|descriptors| {
            descriptors
                .iter()
                .map(|d| {
                    let name = d
                        .get("name")
                        .or_else(|| d.get("Name"))
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let unit = d
                        .get("unit")
                        .or_else(|| d.get("Unit"))
                        .and_then(Value::as_str);
                    classify_channel(name, unit)
                })
                .collect()
        })
        .unwrap_or_default();

    let anchors = analytics
        .get("hr")
        .and_then(Value::as_array)
        .map(|rows| {
            HrAnchors::from_raw(rows.iter().filter_map(|row| {
                let t = row.get("t").and_then(coerce_f64)?;
                let hr = row.get("hr").and_then(coerce_f64)?;
                Some((t, hr))
            }))
        })
        .unwrap_or_default();

    let mut out = Reconstruction::default();
    let Some(samples) = analytics.get("samples").and_then(Value::as_array) else {
        return out;
    };

    for sample in samples {
        let Some(t) = sample.get("t").and_then(coerce_f64) else {
            continue;
        };
        if !t.is_finite() || t < 0.0 {
            continue;
        }
        let mut point = SeriesPoint::at(t.round() as u32);

        if let Some(vs) = sample.get("vs").and_then(Value::as_array) {
            for (i, channel) in channels.iter().enumerate() {
                let Some(v) = vs.get(i).and_then(coerce_f64) else {
                    continue;
                };
                match channel {
                    Channel::Watts => point.watts = Some(v),
                    Channel::Cadence => point.cadence = Some(v),
                    Channel::Vertical(factor) => {
                        let vertical = v * factor;
                        point.vertical_m = Some(vertical);
                        out.max_vertical_m =
                            Some(out.max_vertical_m.map_or(vertical, |m: f64| m.max(vertical)));
                    }
                    Channel::Distance(factor) => {
                        let dist = v * factor;
                        out.max_distance_m =
                            Some(out.max_distance_m.map_or(dist, |m: f64| m.max(dist)));
                    }
                    Channel::Ignore => {}
                }
            }
        }

        point.hr = anchors.hr_at(point.t_sec);
        out.points.push(point);
    }

    sort_points(&mut out.points);
    out
}

/// Derive lap/session aggregates from the completed series.
///
/// Summary-table values are authoritative; aggregates only fill gaps.
fn fill_series_aggregates(points: &[SeriesPoint], metrics: &mut Metrics) {
    let mean = |values: Vec<f64>| -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    let hrs: Vec<f64> = points.iter().filter_map(|p| p.hr).collect();
    if let Some(avg) = mean(hrs.clone()) {
        metrics.entry(metric::AVG_HR.to_string()).or_insert(avg);
    }
    if let Some(max) = hrs.iter().copied().fold(None::<f64>, |m, v| {
        Some(m.map_or(v, |m| m.max(v)))
    }) {
        metrics.entry(metric::MAX_HR.to_string()).or_insert(max);
    }
    if let Some(avg) = mean(points.iter().filter_map(|p| p.watts).collect()) {
        metrics.entry(metric::AVG_POWER.to_string()).or_insert(avg);
    }
    if let Some(avg) = mean(points.iter().filter_map(|p| p.cadence).collect()) {
        metrics.entry(metric::AVG_SPM.to_string()).or_insert(avg);
    }
    if let Some(max) = points.iter().filter_map(|p| p.vertical_m).fold(None::<f64>, |m, v| {
        Some(m.map_or(v, |m| m.max(v)))
    }) {
        metrics.entry(metric::FLOORS.to_string()).or_insert(max);
    }
}
