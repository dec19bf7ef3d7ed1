//! FIT activity-message encoder
//!
//! Produces the ordered message dictionaries a FIT writer consumes: file
//! identification, per-sample records, lap/session/activity summaries, and
//! the optional enhanced-compatibility bracketing messages. The low-level
//! binary serialization (field ids, base types, endianness, CRC) belongs to
//! the external writer behind [`FitMessageWriter`]; this module's
//! responsibility stops at message shape and emission order.

use crate::clock::Clock;
use crate::error::ExportError;
use crate::types::{metric, Workout, WorkoutExportOpts};
use crate::{FORGE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{fit_sport, resolve_start, resolve_track, ResolvedSample};

/// Offset from the Unix epoch to the FIT epoch (1989-12-31T00:00:00Z)
pub const FIT_EPOCH_OFFSET_SECS: i64 = 631_065_600;

/// Fixed heuristic multiplier relating max speed to average speed
const MAX_SPEED_FACTOR: f64 = 1.08;

/// A single field value inside a FIT message dictionary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FitValue {
    UInt(u64),
    SInt(i64),
    Float(f64),
    Str(String),
}

impl FitValue {
    pub fn str(s: impl Into<String>) -> Self {
        FitValue::Str(s.into())
    }
}

/// One FIT message: a kind plus a field dictionary.
///
/// Fields are keyed by the profile field name; missing optional data means
/// the key is simply absent, letting the external writer apply its own
/// defaults. The map is ordered so serialized output is stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitMessage {
    pub kind: &'static str,
    pub fields: BTreeMap<&'static str, FitValue>,
}

impl FitMessage {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, name: &'static str, value: FitValue) -> &mut Self {
        self.fields.insert(name, value);
        self
    }

    pub fn put_opt(&mut self, name: &'static str, value: Option<FitValue>) -> &mut Self {
        if let Some(value) = value {
            self.fields.insert(name, value);
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&FitValue> {
        self.fields.get(name)
    }
}

/// External binary-writer seam.
///
/// Implementations receive messages in emission order and render the final
/// byte buffer; byte-identical output across writer versions is not
/// guaranteed by this crate.
pub trait FitMessageWriter {
    fn write_message(&mut self, message: &FitMessage) -> Result<(), ExportError>;
    fn finish(&mut self) -> Result<Vec<u8>, ExportError>;
}

/// Writer that renders the message stream as JSON, the hand-off format for
/// an out-of-process FIT serializer.
#[derive(Debug, Default)]
pub struct JsonMessageWriter {
    messages: Vec<FitMessage>,
}

impl JsonMessageWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FitMessageWriter for JsonMessageWriter {
    fn write_message(&mut self, message: &FitMessage) -> Result<(), ExportError> {
        self.messages.push(message.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = serde_json::to_vec_pretty(&self.messages)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Build the ordered activity messages for a workout
pub fn build_activity_messages(
    workout: &Workout,
    opts: &WorkoutExportOpts,
    enhanced_compatibility: bool,
    clock: &dyn Clock,
) -> Vec<FitMessage> {
    let start = resolve_start(workout, clock);
    let track = resolve_track(workout, opts);

    let mut hrs: Vec<Option<f64>> = track.samples.iter().map(|s| s.hr).collect();
    if opts.include_hr {
        forward_fill_hr(&mut hrs, workout.avg_or_max_hr());
    }

    let last_offset = track.samples.last().map(|s| s.t_sec).unwrap_or(0);
    let total_time = last_offset.max(1);
    let end = start + Duration::seconds(i64::from(last_offset));
    let (sport, sub_sport) = fit_sport(workout);

    let mut messages = Vec::with_capacity(track.samples.len() + 8);
    messages.push(file_id_message(start));

    if enhanced_compatibility {
        messages.push(file_creator_message());
        messages.push(device_info_message(start));
        messages.push(event_message(start, "start"));
    }

    for (sample, hr) in track.samples.iter().zip(&hrs) {
        messages.push(record_message(start, sample, *hr));
    }

    let mut lap = FitMessage::new("lap");
    lap.put("message_index", FitValue::UInt(0));
    summary_fields(&mut lap, workout, opts, start, end, total_time, &hrs);
    lap.put("event", FitValue::str("lap"));
    lap.put("event_type", FitValue::str("stop"));
    lap.put("sport", FitValue::str(sport));
    lap.put("sub_sport", FitValue::str(sub_sport));
    messages.push(lap);

    let mut session = FitMessage::new("session");
    session.put("message_index", FitValue::UInt(0));
    session.put("first_lap_index", FitValue::UInt(0));
    session.put("num_laps", FitValue::UInt(1));
    summary_fields(&mut session, workout, opts, start, end, total_time, &hrs);
    session.put("event", FitValue::str("session"));
    session.put("event_type", FitValue::str("stop"));
    session.put("trigger", FitValue::str("activity_end"));
    session.put("sport", FitValue::str(sport));
    session.put("sub_sport", FitValue::str(sub_sport));
    messages.push(session);

    let mut activity = FitMessage::new("activity");
    activity.put("timestamp", FitValue::UInt(fit_timestamp(end)));
    activity.put("local_timestamp", FitValue::UInt(fit_timestamp(end)));
    activity.put("total_timer_time", FitValue::Float(f64::from(total_time)));
    activity.put("num_sessions", FitValue::UInt(1));
    activity.put("type", FitValue::str("manual"));
    activity.put("event", FitValue::str("activity"));
    activity.put("event_type", FitValue::str("stop"));
    messages.push(activity);

    if enhanced_compatibility {
        messages.push(event_message(end, "stop_all"));
        messages.push(device_info_message(end));
    }

    messages
}

/// Encode a workout through an external message writer
pub fn encode_activity(
    workout: &Workout,
    opts: &WorkoutExportOpts,
    enhanced_compatibility: bool,
    clock: &dyn Clock,
    writer: &mut dyn FitMessageWriter,
) -> Result<Vec<u8>, ExportError> {
    for message in build_activity_messages(workout, opts, enhanced_compatibility, clock) {
        writer.write_message(&message)?;
    }
    writer.finish()
}

/// Defensive forward-fill over heart-rate gaps.
///
/// Seeds from the average/max fallback when available, else from the first
/// known record value, then propagates the most recently seen value into
/// every gap. Kept as a second, independent pass on top of series-level
/// interpolation; downstream consumers have shown gapped HR rendering even
/// after interpolation and the two passes stay separately testable.
fn forward_fill_hr(hrs: &mut [Option<f64>], fallback: Option<f64>) {
    let mut last = fallback.or_else(|| hrs.iter().flatten().next().copied());
    for hr in hrs.iter_mut() {
        match hr {
            Some(v) => last = Some(*v),
            None => *hr = last,
        }
    }
}

fn file_id_message(start: DateTime<Utc>) -> FitMessage {
    let mut msg = FitMessage::new("file_id");
    msg.put("type", FitValue::str("activity"));
    msg.put("manufacturer", FitValue::str("development"));
    msg.put("product", FitValue::UInt(1));
    msg.put("serial_number", FitValue::UInt(1));
    msg.put("time_created", FitValue::UInt(fit_timestamp(start)));
    msg
}

fn file_creator_message() -> FitMessage {
    let mut msg = FitMessage::new("file_creator");
    msg.put("software_version", FitValue::UInt(software_version()));
    msg
}

fn device_info_message(at: DateTime<Utc>) -> FitMessage {
    let mut msg = FitMessage::new("device_info");
    msg.put("timestamp", FitValue::UInt(fit_timestamp(at)));
    msg.put("device_index", FitValue::UInt(0));
    msg.put("manufacturer", FitValue::str("development"));
    msg.put("product_name", FitValue::str(PRODUCER_NAME));
    msg.put("software_version", FitValue::UInt(software_version()));
    msg.put("source_type", FitValue::str("local"));
    msg
}

fn event_message(at: DateTime<Utc>, event_type: &'static str) -> FitMessage {
    let mut msg = FitMessage::new("event");
    msg.put("timestamp", FitValue::UInt(fit_timestamp(at)));
    msg.put("event", FitValue::str("timer"));
    msg.put("event_type", FitValue::str(event_type));
    msg.put("event_group", FitValue::UInt(0));
    msg
}

fn record_message(start: DateTime<Utc>, sample: &ResolvedSample, hr: Option<f64>) -> FitMessage {
    let at = start + Duration::seconds(i64::from(sample.t_sec));
    let mut msg = FitMessage::new("record");
    msg.put("timestamp", FitValue::UInt(fit_timestamp(at)));
    msg.put_opt("heart_rate", hr.map(|v| FitValue::UInt(v.round() as u64)));
    msg.put_opt(
        "cadence",
        sample.cadence.map(|v| FitValue::UInt(v.round() as u64)),
    );
    msg.put_opt("power", sample.watts.map(|v| FitValue::UInt(v.round() as u64)));
    msg.put_opt("distance", sample.distance_m.map(FitValue::Float));
    msg.put_opt("altitude", sample.altitude_m.map(FitValue::Float));
    msg
}

#[allow(clippy::too_many_arguments)]
fn summary_fields(
    msg: &mut FitMessage,
    workout: &Workout,
    opts: &WorkoutExportOpts,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    total_time: u32,
    hrs: &[Option<f64>],
) {
    msg.put("timestamp", FitValue::UInt(fit_timestamp(end)));
    msg.put("start_time", FitValue::UInt(fit_timestamp(start)));
    msg.put("total_elapsed_time", FitValue::Float(f64::from(total_time)));
    msg.put("total_timer_time", FitValue::Float(f64::from(total_time)));

    if opts.include_distance {
        if let Some(distance) = workout.distance_m {
            let avg_speed = distance / f64::from(total_time);
            msg.put("total_distance", FitValue::Float(distance));
            msg.put("avg_speed", FitValue::Float(avg_speed));
            msg.put("max_speed", FitValue::Float(avg_speed * MAX_SPEED_FACTOR));
        }
    }
    if opts.include_calories {
        if let Some(calories) = workout.calories {
            msg.put("total_calories", FitValue::UInt(calories.round() as u64));
        }
    }
    if opts.include_hr {
        let avg = workout
            .metric(metric::AVG_HR)
            .or_else(|| mean(hrs.iter().flatten().copied()));
        let max = workout
            .metric(metric::MAX_HR)
            .or_else(|| hrs.iter().flatten().copied().fold(None, fold_max));
        msg.put_opt(
            "avg_heart_rate",
            avg.map(|v| FitValue::UInt(v.round() as u64)),
        );
        msg.put_opt(
            "max_heart_rate",
            max.map(|v| FitValue::UInt(v.round() as u64)),
        );
    }
    if opts.include_cadence {
        let cadence = workout
            .cadence_spm
            .or_else(|| workout.metric(metric::AVG_SPM));
        msg.put_opt(
            "avg_cadence",
            cadence.map(|v| FitValue::UInt(v.round() as u64)),
        );
    }
    if opts.include_power {
        if let Some(avg_power) = workout.metric(metric::AVG_POWER) {
            msg.put("avg_power", FitValue::UInt(avg_power.round() as u64));
            msg.put(
                "total_work",
                FitValue::UInt((avg_power * f64::from(total_time)).round() as u64),
            );
        }
    }
    if opts.include_vertical {
        if let Some(vertical) = workout.vertical_m {
            msg.put(
                "total_ascent",
                FitValue::UInt(vertical.max(0.0).round() as u64),
            );
            msg.put("total_descent", FitValue::UInt(0));
        }
    }
}

fn fit_timestamp(at: DateTime<Utc>) -> u64 {
    (at.timestamp() - FIT_EPOCH_OFFSET_SECS).max(0) as u64
}

fn software_version() -> u64 {
    // "0.1.0" -> 1 (major * 100 + minor)
    let mut parts = FORGE_VERSION.split('.');
    let major: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    major * 100 + minor
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.iter().sum::<f64>() / collected.len() as f64)
    }
}

fn fold_max(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |m| m.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::options::resolve_export_opts;
    use crate::types::{SeriesPoint, Source};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    fn series_workout() -> Workout {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.name = "Stair climbing".to_string();
        w.started_at = Some(Utc.with_ymd_and_hms(2024, 4, 20, 7, 0, 0).unwrap());
        w.duration_sec = Some(10);
        w.distance_m = Some(100.0);
        w.vertical_m = Some(30.0);
        w.metrics.insert(metric::AVG_HR.to_string(), 120.0);
        w.metrics.insert(metric::MAX_HR.to_string(), 140.0);
        let mut p0 = SeriesPoint::at(0);
        p0.hr = Some(100.0);
        let mut p1 = SeriesPoint::at(5);
        p1.hr = Some(120.0);
        let mut p2 = SeriesPoint::at(10);
        p2.hr = Some(140.0);
        w.series = Some(vec![p0, p1, p2]);
        w.export_opts = resolve_export_opts(&w);
        w
    }

    fn kinds(messages: &[FitMessage]) -> Vec<&'static str> {
        messages.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn plain_message_order() {
        let w = series_workout();
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        assert_eq!(
            kinds(&messages),
            vec!["file_id", "record", "record", "record", "lap", "session", "activity"]
        );
    }

    #[test]
    fn enhanced_mode_brackets_the_record_stream() {
        let w = series_workout();
        let messages = build_activity_messages(&w, &w.export_opts, true, &clock());
        assert_eq!(
            kinds(&messages),
            vec![
                "file_id",
                "file_creator",
                "device_info",
                "event",
                "record",
                "record",
                "record",
                "lap",
                "session",
                "activity",
                "event",
                "device_info",
            ]
        );
        // Start event before records, stop event after the summaries
        assert_eq!(
            messages[3].field("event_type"),
            Some(&FitValue::str("start"))
        );
        assert_eq!(
            messages[10].field("event_type"),
            Some(&FitValue::str("stop_all"))
        );
    }

    #[test]
    fn records_ascend_by_timestamp() {
        let w = series_workout();
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        let stamps: Vec<u64> = messages
            .iter()
            .filter(|m| m.kind == "record")
            .map(|m| match m.field("timestamp") {
                Some(FitValue::UInt(ts)) => *ts,
                other => panic!("unexpected timestamp value: {other:?}"),
            })
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn lap_summary_aggregates() {
        let w = series_workout();
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        let lap = messages.iter().find(|m| m.kind == "lap").unwrap();

        assert_eq!(lap.field("avg_heart_rate"), Some(&FitValue::UInt(120)));
        assert_eq!(lap.field("max_heart_rate"), Some(&FitValue::UInt(140)));
        assert_eq!(lap.field("total_distance"), Some(&FitValue::Float(100.0)));
        assert_eq!(lap.field("avg_speed"), Some(&FitValue::Float(10.0)));
        match lap.field("max_speed") {
            Some(FitValue::Float(v)) => assert!((v - 10.8).abs() < 1e-9),
            other => panic!("unexpected max_speed: {other:?}"),
        }
        assert_eq!(lap.field("total_ascent"), Some(&FitValue::UInt(30)));
        assert_eq!(lap.field("total_descent"), Some(&FitValue::UInt(0)));
        assert_eq!(lap.field("sport"), Some(&FitValue::str("fitness_equipment")));
        assert_eq!(
            lap.field("sub_sport"),
            Some(&FitValue::str("stair_climbing"))
        );
    }

    #[test]
    fn forward_fill_matches_expected_sequence() {
        let mut hrs = vec![None, None, Some(150.0), None];
        forward_fill_hr(&mut hrs, Some(130.0));
        assert_eq!(
            hrs,
            vec![Some(130.0), Some(130.0), Some(150.0), Some(150.0)]
        );
    }

    #[test]
    fn forward_fill_without_fallback_seeds_from_first_known() {
        let mut hrs = vec![None, Some(110.0), None];
        forward_fill_hr(&mut hrs, None);
        assert_eq!(hrs, vec![Some(110.0), Some(110.0), Some(110.0)]);

        let mut empty: Vec<Option<f64>> = vec![None, None];
        forward_fill_hr(&mut empty, None);
        assert_eq!(empty, vec![None, None]);
    }

    #[test]
    fn record_hr_gaps_are_filled_in_output() {
        let mut w = series_workout();
        if let Some(series) = w.series.as_mut() {
            series[1].hr = None;
        }
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        let records: Vec<&FitMessage> =
            messages.iter().filter(|m| m.kind == "record").collect();
        // Gap at t=5 takes the last seen value from t=0
        assert_eq!(records[1].field("heart_rate"), Some(&FitValue::UInt(100)));
    }

    #[test]
    fn total_time_has_a_floor_of_one_second() {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.series = Some(vec![SeriesPoint::at(0)]);
        w.started_at = Some(Utc.with_ymd_and_hms(2024, 4, 20, 7, 0, 0).unwrap());
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        let lap = messages.iter().find(|m| m.kind == "lap").unwrap();
        assert_eq!(lap.field("total_timer_time"), Some(&FitValue::Float(1.0)));
    }

    #[test]
    fn missing_optional_fields_are_omitted_not_defaulted() {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.duration_sec = Some(10);
        w.started_at = Some(Utc.with_ymd_and_hms(2024, 4, 20, 7, 0, 0).unwrap());
        let messages = build_activity_messages(&w, &w.export_opts, false, &clock());
        let record = messages.iter().find(|m| m.kind == "record").unwrap();
        assert!(record.field("heart_rate").is_none());
        assert!(record.field("power").is_none());
        let lap = messages.iter().find(|m| m.kind == "lap").unwrap();
        assert!(lap.field("total_distance").is_none());
        assert!(lap.field("total_calories").is_none());
    }

    #[test]
    fn reencoding_is_deterministic() {
        let w = series_workout();
        let mut writer_a = JsonMessageWriter::new();
        let a = encode_activity(&w, &w.export_opts, true, &clock(), &mut writer_a).unwrap();
        let mut writer_b = JsonMessageWriter::new();
        let b = encode_activity(&w, &w.export_opts, true, &clock(), &mut writer_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fit_timestamps_use_the_garmin_epoch() {
        let at = Utc.with_ymd_and_hms(1989, 12, 31, 0, 0, 1).unwrap();
        assert_eq!(fit_timestamp(at), 1);
        let before_epoch = Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(fit_timestamp(before_epoch), 0);
    }
}
