//! Output encoders
//!
//! Both encoders consume the same canonical `(Workout, WorkoutExportOpts)`
//! pair and share one per-point derivation: distance pro-rated over the
//! series span, altitude taken from the point or pro-rated from the workout
//! total, cadence and power falling back to workout-level defaults. When no
//! series exists, trackpoints are synthesized at a fixed 5-second cadence.

pub mod fit;
pub mod tcx;

use crate::adapters::first_timestamp;
use crate::clock::Clock;
use crate::series::sort_points;
use crate::types::{metric, Source, Workout, WorkoutExportOpts};
use chrono::{DateTime, Utc};

/// Synthetic-fallback sampling interval
const SYNTHETIC_STEP_SEC: u32 = 5;

/// One fully-derived output sample, channel-gated by the export options
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedSample {
    pub t_sec: u32,
    pub hr: Option<f64>,
    pub cadence: Option<f64>,
    pub watts: Option<f64>,
    pub distance_m: Option<f64>,
    pub altitude_m: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedTrack {
    pub samples: Vec<ResolvedSample>,
    /// Span used for pro-ration: max(declared duration, last sample offset)
    pub total_sec: u32,
}

/// Wall-clock start instant with the fixed fallback chain: canonical start
/// time, then the raw payload's alternate start fields, then "now".
pub(crate) fn resolve_start(workout: &Workout, clock: &dyn Clock) -> DateTime<Utc> {
    workout
        .started_at
        .or_else(|| {
            first_timestamp(
                &workout.raw,
                &["startTime", "startedAt", "started_at", "on", "date", "performedDate"],
            )
        })
        .unwrap_or_else(|| clock.now())
}

/// Derive the output samples for a workout.
///
/// A non-empty series is sorted defensively and each point resolved against
/// the workout totals; otherwise the synthetic fallback emits at least two
/// fixed-cadence points carrying the constant average-or-max heart rate.
pub(crate) fn resolve_track(workout: &Workout, opts: &WorkoutExportOpts) -> ResolvedTrack {
    let default_cadence = workout
        .cadence_spm
        .or_else(|| workout.metric(metric::AVG_SPM));
    let default_watts = workout.metric(metric::AVG_POWER);

    let mut points = workout.series_points().to_vec();
    if points.is_empty() {
        return synthetic_track(workout, opts, default_cadence, default_watts);
    }
    sort_points(&mut points);

    let last_t = points.last().map(|p| p.t_sec).unwrap_or(0);
    let total_sec = workout.duration_or_zero().max(last_t);

    let samples = points
        .iter()
        .map(|p| {
            let factor = proration_factor(p.t_sec, total_sec);
            ResolvedSample {
                t_sec: p.t_sec,
                hr: if opts.include_hr { p.hr } else { None },
                cadence: if opts.include_cadence {
                    p.cadence.or(default_cadence)
                } else {
                    None
                },
                watts: if opts.include_power {
                    p.watts.or(default_watts)
                } else {
                    None
                },
                distance_m: if opts.include_distance {
                    workout.distance_m.map(|d| d * factor)
                } else {
                    None
                },
                altitude_m: if opts.include_vertical {
                    p.vertical_m
                        .or_else(|| workout.vertical_m.map(|v| v * factor))
                } else {
                    None
                },
            }
        })
        .collect();

    ResolvedTrack { samples, total_sec }
}

/// Fixed-cadence synthetic fallback: minimum 2 points, maximum
/// `floor(duration/5) + 1`. This path never interpolates; heart rate is the
/// constant average-or-max value.
fn synthetic_track(
    workout: &Workout,
    opts: &WorkoutExportOpts,
    default_cadence: Option<f64>,
    default_watts: Option<f64>,
) -> ResolvedTrack {
    let duration = workout.duration_or_zero();
    let count = (duration / SYNTHETIC_STEP_SEC + 1).max(2);
    let last_t = (count - 1) * SYNTHETIC_STEP_SEC;
    let total_sec = duration.max(last_t);

    let constant_hr = if opts.include_hr {
        workout.avg_or_max_hr()
    } else {
        None
    };

    let samples = (0..count)
        .map(|i| {
            let t_sec = i * SYNTHETIC_STEP_SEC;
            let factor = proration_factor(t_sec, total_sec);
            ResolvedSample {
                t_sec,
                hr: constant_hr,
                cadence: if opts.include_cadence { default_cadence } else { None },
                watts: if opts.include_power { default_watts } else { None },
                distance_m: if opts.include_distance {
                    workout.distance_m.map(|d| d * factor)
                } else {
                    None
                },
                altitude_m: if opts.include_vertical {
                    workout.vertical_m.map(|v| v * factor)
                } else {
                    None
                },
            }
        })
        .collect();

    ResolvedTrack { samples, total_sec }
}

fn proration_factor(t_sec: u32, total_sec: u32) -> f64 {
    if total_sec == 0 {
        0.0
    } else {
        f64::from(t_sec) / f64::from(total_sec)
    }
}

/// Sport classification shared by both encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sport {
    Running,
    Biking,
    Other,
}

/// Fixed keyword match over the activity name
pub(crate) fn classify_sport(name: &str) -> Sport {
    let name = name.to_ascii_lowercase();
    if name.contains("run") {
        Sport::Running
    } else if name.contains("cycle") || name.contains("bike") || name.contains("ride") {
        Sport::Biking
    } else {
        Sport::Other
    }
}

/// FIT sport/sub-sport pair, extending the keyword heuristic with a
/// stair-climbing sub-sport and a generic equipment sport for indoor sources.
pub(crate) fn fit_sport(workout: &Workout) -> (&'static str, &'static str) {
    match classify_sport(&workout.name) {
        Sport::Running => ("running", "generic"),
        Sport::Biking => ("cycling", "generic"),
        Sport::Other => {
            let name = workout.name.to_ascii_lowercase();
            if name.contains("stair") || name.contains("climb") || name.contains("floor") {
                ("fitness_equipment", "stair_climbing")
            } else if workout.source == Source::Indoor {
                ("fitness_equipment", "generic")
            } else {
                ("generic", "generic")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::resolve_export_opts;
    use crate::types::SeriesPoint;
    use pretty_assertions::assert_eq;

    fn workout_with_series(points: Vec<SeriesPoint>) -> Workout {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.series = Some(points);
        w.export_opts = resolve_export_opts(&w);
        w
    }

    #[test]
    fn synthetic_count_for_zero_duration_is_two() {
        let w = Workout::new("u1", "1", Source::Indoor);
        let track = resolve_track(&w, &WorkoutExportOpts::default());
        assert_eq!(track.samples.len(), 2);
        assert_eq!(track.samples[0].t_sec, 0);
        assert_eq!(track.samples[1].t_sec, 5);
    }

    #[test]
    fn synthetic_count_for_23_seconds_is_five() {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.duration_sec = Some(23);
        let track = resolve_track(&w, &WorkoutExportOpts::default());
        assert_eq!(track.samples.len(), 5);
        let offsets: Vec<u32> = track.samples.iter().map(|s| s.t_sec).collect();
        assert_eq!(offsets, vec![0, 5, 10, 15, 20]);
        assert_eq!(track.total_sec, 23);
    }

    #[test]
    fn synthetic_hr_is_constant_average() {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.duration_sec = Some(10);
        w.metrics.insert(metric::AVG_HR.to_string(), 133.0);
        let opts = WorkoutExportOpts {
            include_hr: true,
            ..Default::default()
        };
        let track = resolve_track(&w, &opts);
        assert!(track.samples.iter().all(|s| s.hr == Some(133.0)));
    }

    #[test]
    fn distance_proration_is_exact() {
        let mut w = workout_with_series(vec![
            SeriesPoint::at(0),
            SeriesPoint::at(25),
            SeriesPoint::at(100),
        ]);
        w.distance_m = Some(1000.0);
        let opts = WorkoutExportOpts {
            include_distance: true,
            ..Default::default()
        };
        let track = resolve_track(&w, &opts);
        assert_eq!(track.total_sec, 100);
        assert_eq!(track.samples[1].distance_m, Some(250.0));
        assert_eq!(track.samples[2].distance_m, Some(1000.0));
    }

    #[test]
    fn unsorted_series_is_sorted_before_derivation() {
        let w = workout_with_series(vec![
            SeriesPoint::at(50),
            SeriesPoint::at(0),
            SeriesPoint::at(25),
        ]);
        let track = resolve_track(&w, &WorkoutExportOpts::default());
        let offsets: Vec<u32> = track.samples.iter().map(|s| s.t_sec).collect();
        assert_eq!(offsets, vec![0, 25, 50]);
    }

    #[test]
    fn span_uses_declared_duration_when_longer() {
        let mut w = workout_with_series(vec![SeriesPoint::at(0), SeriesPoint::at(40)]);
        w.duration_sec = Some(80);
        let track = resolve_track(&w, &WorkoutExportOpts::default());
        assert_eq!(track.total_sec, 80);
    }

    #[test]
    fn point_altitude_overrides_proration() {
        let mut p0 = SeriesPoint::at(0);
        p0.vertical_m = Some(2.0);
        let mut w = workout_with_series(vec![p0, SeriesPoint::at(10)]);
        w.vertical_m = Some(100.0);
        let opts = WorkoutExportOpts {
            include_vertical: true,
            ..Default::default()
        };
        let track = resolve_track(&w, &opts);
        assert_eq!(track.samples[0].altitude_m, Some(2.0));
        assert_eq!(track.samples[1].altitude_m, Some(100.0));
    }

    #[test]
    fn disabled_channels_resolve_to_none() {
        let mut p = SeriesPoint::at(0);
        p.hr = Some(140.0);
        p.watts = Some(200.0);
        let mut w = workout_with_series(vec![p, SeriesPoint::at(10)]);
        w.distance_m = Some(500.0);
        let track = resolve_track(&w, &WorkoutExportOpts::default());
        assert!(track.samples[0].hr.is_none());
        assert!(track.samples[0].watts.is_none());
        assert!(track.samples[0].distance_m.is_none());
    }

    #[test]
    fn sport_keyword_classification() {
        assert_eq!(classify_sport("Morning Run"), Sport::Running);
        assert_eq!(classify_sport("Gravel ride"), Sport::Biking);
        assert_eq!(classify_sport("Stair climbing"), Sport::Other);
    }

    #[test]
    fn fit_sport_extends_with_stairs_and_equipment() {
        let mut w = Workout::new("u1", "1", Source::Indoor);
        w.name = "Stair climbing".to_string();
        assert_eq!(fit_sport(&w), ("fitness_equipment", "stair_climbing"));
        w.name = "Session".to_string();
        assert_eq!(fit_sport(&w), ("fitness_equipment", "generic"));
        w.source = Source::Outdoor;
        assert_eq!(fit_sport(&w), ("generic", "generic"));
        w.name = "Evening run".to_string();
        assert_eq!(fit_sport(&w), ("running", "generic"));
    }
}
