//! Indoor-machine batch adapter
//!
//! The indoor export is a flat JSON array of machine sessions, each carrying
//! a `pr`-style metrics array and an `on` start-time field.

use crate::clock::Clock;
use crate::error::ExportError;
use crate::options::resolve_export_opts;
use crate::types::{metric, Source, Workout};
use serde_json::Value;

use super::{
    activity_name, derive_cadence, derive_distance, derive_vertical, first_id, first_timestamp,
    fold_metrics, SourceAdapter,
};

/// Indoor batch adapter
pub struct IndoorAdapter;

impl SourceAdapter for IndoorAdapter {
    fn parse(&self, raw_json: &str, clock: &dyn Clock) -> Result<Vec<Workout>, ExportError> {
        let payload: Value = serde_json::from_str(raw_json)?;
        let records = payload.as_array().ok_or_else(|| {
            ExportError::SchemaMismatch("indoor export is not a JSON array".to_string())
        })?;

        let mut workouts = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            workouts.push(convert_record(record, idx, clock));
        }
        Ok(workouts)
    }
}

fn convert_record(record: &Value, idx: usize, clock: &dyn Clock) -> Workout {
    let metrics = fold_metrics(record);
    if metrics.is_empty() {
        log::debug!("indoor record {idx} has no extractable metrics");
    }

    let uid = first_id(record, &["uid", "Uid"]).unwrap_or_else(|| format!("indoor-{idx}"));
    let id = first_id(record, &["id", "Id"]).unwrap_or_else(|| uid.clone());

    let mut workout = Workout::new(uid, id, Source::Indoor);
    workout.started_at = first_timestamp(record, &["on", "On"]).or_else(|| Some(clock.now()));
    workout.duration_sec = metrics.get(metric::DURATION).map(|d| d.max(0.0) as u32);
    workout.calories = metrics.get(metric::CALORIES).copied();
    workout.distance_m = derive_distance(&metrics);
    workout.vertical_m = derive_vertical(&metrics);
    workout.cadence_spm = derive_cadence(&metrics);
    workout.name = activity_name(record, workout.vertical_m, Source::Indoor);
    workout.metrics = metrics;
    workout.raw = record.clone();
    workout.export_opts = resolve_export_opts(&workout);
    workout
}
