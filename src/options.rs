//! Export option defaults
//!
//! Pure derivation of per-channel inclusion flags from the data a workout
//! actually carries. The result seeds user-facing toggles; encoders honor
//! whatever the current `export_opts` value is and never re-derive it.

use crate::types::{metric, Workout, WorkoutExportOpts};

/// Default export options for a normalized workout.
///
/// Each flag is true exactly when its backing data exists.
pub fn resolve_export_opts(workout: &Workout) -> WorkoutExportOpts {
    let series = workout.series_points();
    WorkoutExportOpts {
        include_hr: workout.metrics.contains_key(metric::AVG_HR)
            || workout.metrics.contains_key(metric::MAX_HR)
            || series.iter().any(|p| p.hr.is_some()),
        include_cadence: workout.cadence_spm.is_some()
            || workout.metrics.contains_key(metric::AVG_SPM)
            || series.iter().any(|p| p.cadence.is_some()),
        include_power: workout.metrics.contains_key(metric::AVG_POWER)
            || series.iter().any(|p| p.watts.is_some()),
        include_vertical: workout.vertical_m.is_some()
            || series.iter().any(|p| p.vertical_m.is_some()),
        include_distance: workout.distance_m.is_some(),
        include_calories: workout.calories.is_some()
            || workout.metrics.contains_key(metric::CALORIES),
        include_notes: !workout.metrics.is_empty(),
    }
}
