//! Pipeline orchestration
//!
//! The public API: import raw export JSON by declared shape, then encode
//! each canonical workout into TCX or FIT messages. Everything runs
//! synchronously; batch export walks workouts sequentially, each encoding
//! reading only its own `(Workout, opts)` pair.

use crate::adapters::{DetailAdapter, IndoorAdapter, OutdoorAdapter, SourceAdapter};
use crate::clock::{Clock, SystemClock};
use crate::encoders::fit::{
    build_activity_messages, encode_activity, FitMessage, FitMessageWriter,
};
use crate::encoders::tcx::encode_tcx;
use crate::error::ExportError;
use crate::types::Workout;
use chrono::{NaiveTime, Timelike};

/// Declared shape of a raw export payload.
///
/// Shapes form a closed set: each is normalized through its own mapping
/// function, and unrecognized containers are rejected rather than probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    Indoor,
    Outdoor,
    SingleDetail,
}

impl std::str::FromStr for SourceShape {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indoor" => Ok(SourceShape::Indoor),
            "outdoor" => Ok(SourceShape::Outdoor),
            "detail" | "single-detail" => Ok(SourceShape::SingleDetail),
            other => Err(ExportError::UnsupportedShape(other.to_string())),
        }
    }
}

/// Importer/exporter with an injectable clock.
///
/// The clock only matters when a workout carries no usable start time; the
/// default system clock makes that fallback nondeterministic, which is the
/// documented exception to reproducible output.
pub struct Exporter {
    clock: Box<dyn Clock>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self {
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Normalize one raw export payload into canonical workouts
    pub fn import(&self, shape: SourceShape, raw_json: &str) -> Result<Vec<Workout>, ExportError> {
        let adapter: &dyn SourceAdapter = match shape {
            SourceShape::Indoor => &IndoorAdapter,
            SourceShape::Outdoor => &OutdoorAdapter,
            SourceShape::SingleDetail => &DetailAdapter,
        };
        let workouts = adapter.parse(raw_json, self.clock.as_ref())?;
        log::debug!("imported {} workout(s) from {shape:?} payload", workouts.len());
        Ok(workouts)
    }

    /// Render one workout as a TCX document
    pub fn export_tcx(&self, workout: &Workout) -> String {
        encode_tcx(workout, &workout.export_opts, self.clock.as_ref())
    }

    /// Build the ordered FIT messages for one workout
    pub fn build_fit_messages(&self, workout: &Workout, enhanced: bool) -> Vec<FitMessage> {
        build_activity_messages(workout, &workout.export_opts, enhanced, self.clock.as_ref())
    }

    /// Encode one workout to bytes through an external FIT writer
    pub fn encode_fit(
        &self,
        workout: &Workout,
        enhanced: bool,
        writer: &mut dyn FitMessageWriter,
    ) -> Result<Vec<u8>, ExportError> {
        encode_activity(
            workout,
            &workout.export_opts,
            enhanced,
            self.clock.as_ref(),
            writer,
        )
    }

    /// Render a whole collection as TCX, strictly sequentially
    pub fn export_all_tcx(&self, workouts: &[Workout]) -> Vec<String> {
        workouts.iter().map(|w| self.export_tcx(w)).collect()
    }
}

/// Apply a user-facing `HH:MM[:SS]` start-time override.
///
/// Replaces the time-of-day of an existing start timestamp, which a
/// date-only source field leaves at midnight. Invalid override strings are
/// ignored and the original timestamp kept.
pub fn apply_time_override(workout: &mut Workout, override_str: &str) {
    let Some(time) = parse_time_override(override_str) else {
        log::warn!("ignoring invalid start-time override {override_str:?}");
        return;
    };
    if let Some(started) = workout.started_at {
        workout.started_at = started
            .with_hour(time.hour())
            .and_then(|d| d.with_minute(time.minute()))
            .and_then(|d| d.with_second(time.second()));
    }
}

fn parse_time_override(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
