//! Outdoor-activity batch adapter
//!
//! The outdoor export is either a bare JSON array or an object wrapping the
//! array under `items`, `activities`, or `data`. Records carry their own
//! metric arrays plus loose top-level `duration`/`calories` fields used as
//! fallbacks when the metric array lacks them.

use crate::clock::Clock;
use crate::error::ExportError;
use crate::options::resolve_export_opts;
use crate::types::{metric, Source, Workout};
use serde_json::Value;

use super::{
    activity_name, coerce_f64, derive_cadence, derive_distance, derive_vertical, first_id,
    first_timestamp, fold_metrics, SourceAdapter,
};

/// Outdoor batch adapter
pub struct OutdoorAdapter;

impl SourceAdapter for OutdoorAdapter {
    fn parse(&self, raw_json: &str, clock: &dyn Clock) -> Result<Vec<Workout>, ExportError> {
        let payload: Value = serde_json::from_str(raw_json)?;
        let records = extract_records(&payload).ok_or_else(|| {
            ExportError::SchemaMismatch(
                "outdoor export has no items/activities/data array".to_string(),
            )
        })?;

        let mut workouts = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            workouts.push(convert_record(record, idx, clock));
        }
        Ok(workouts)
    }
}

fn extract_records(payload: &Value) -> Option<&Vec<Value>> {
    if let Some(records) = payload.as_array() {
        return Some(records);
    }
    for key in ["items", "activities", "data"] {
        if let Some(records) = payload.get(key).and_then(Value::as_array) {
            return Some(records);
        }
    }
    None
}

fn convert_record(record: &Value, idx: usize, clock: &dyn Clock) -> Workout {
    let metrics = fold_metrics(record);

    let uid = first_id(record, &["uid", "Uid"]).unwrap_or_else(|| format!("outdoor-{idx}"));
    let id = first_id(record, &["id", "Id"]).unwrap_or_else(|| uid.clone());

    let mut workout = Workout::new(uid, id, Source::Outdoor);
    workout.started_at = first_timestamp(
        record,
        &["startedAt", "started_at", "startTime", "date", "on"],
    )
    .or_else(|| Some(clock.now()));
    workout.duration_sec = metrics
        .get(metric::DURATION)
        .copied()
        .or_else(|| record.get("duration").and_then(coerce_f64))
        .map(|d| d.max(0.0) as u32);
    workout.calories = metrics
        .get(metric::CALORIES)
        .copied()
        .or_else(|| record.get("calories").and_then(coerce_f64));
    workout.distance_m = derive_distance(&metrics);
    workout.vertical_m = derive_vertical(&metrics);
    workout.cadence_spm = derive_cadence(&metrics);
    workout.name = activity_name(record, workout.vertical_m, Source::Outdoor);
    workout.metrics = metrics;
    workout.raw = record.clone();
    workout.export_opts = resolve_export_opts(&workout);
    workout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn parses_wrapped_activity_array() {
        let json = r#"{
            "items": [
                {
                    "id": "run-7",
                    "name": "Tempo run",
                    "startedAt": "2024-04-28T07:15:00Z",
                    "duration": 2400,
                    "calories": 512,
                    "pr": [
                        {"name": "HDistance", "value": 8000},
                        {"name": "AvgHr", "value": 151}
                    ]
                }
            ]
        }"#;

        let workouts = OutdoorAdapter.parse(json, &clock()).unwrap();
        assert_eq!(workouts.len(), 1);
        let w = &workouts[0];
        assert_eq!(w.source, Source::Outdoor);
        assert_eq!(w.name, "Tempo run");
        assert_eq!(w.distance_m, Some(8000.0));
        // Loose top-level fields back up the metric array
        assert_eq!(w.duration_sec, Some(2400));
        assert_eq!(w.calories, Some(512.0));
        assert!(w.export_opts.include_distance);
    }

    #[test]
    fn metric_array_beats_loose_fields() {
        let json = r#"[{
            "id": "w1",
            "duration": 100,
            "calories": 90,
            "pr": [
                {"name": "Duration", "value": 3600},
                {"name": "Calories", "value": 700}
            ]
        }]"#;
        let workouts = OutdoorAdapter.parse(json, &clock()).unwrap();
        assert_eq!(workouts[0].duration_sec, Some(3600));
        assert_eq!(workouts[0].calories, Some(700.0));
    }

    #[test]
    fn bare_array_is_accepted() {
        let workouts = OutdoorAdapter.parse(r#"[{"id": "a"}]"#, &clock()).unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].name, "Outdoor workout");
    }

    #[test]
    fn object_without_record_array_is_schema_mismatch() {
        let err = OutdoorAdapter
            .parse(r#"{"total": 3}"#, &clock())
            .unwrap_err();
        assert!(matches!(err, ExportError::SchemaMismatch(_)));
    }
}
