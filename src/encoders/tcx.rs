//! TCX trackpoint-document encoder
//!
//! Renders a canonical workout into a Training Center Database XML document.
//! Optional per-point fields are omitted entirely when absent rather than
//! emitted as empty placeholders.

use crate::clock::Clock;
use crate::types::{Workout, WorkoutExportOpts};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

use super::{classify_sport, resolve_start, resolve_track, Sport};

const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const TPX_NS: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";

/// Encode a workout into a TCX document string
pub fn encode_tcx(workout: &Workout, opts: &WorkoutExportOpts, clock: &dyn Clock) -> String {
    let start = resolve_start(workout, clock);
    let track = resolve_track(workout, opts);

    let sport = match classify_sport(&workout.name) {
        Sport::Running => "Running",
        Sport::Biking => "Biking",
        Sport::Other => "Other",
    };

    let mut out = String::with_capacity(1024 + track.samples.len() * 256);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<TrainingCenterDatabase xmlns=\"{TCX_NS}\" xmlns:ns3=\"{TPX_NS}\">\n"
    ));
    out.push_str("  <Activities>\n");
    out.push_str(&format!("    <Activity Sport=\"{sport}\">\n"));
    out.push_str(&format!("      <Id>{}</Id>\n", iso(start)));
    out.push_str(&format!("      <Lap StartTime=\"{}\">\n", iso(start)));
    out.push_str(&format!(
        "        <TotalTimeSeconds>{:.1}</TotalTimeSeconds>\n",
        f64::from(track.total_sec)
    ));
    if opts.include_distance {
        if let Some(distance) = workout.distance_m {
            out.push_str(&format!(
                "        <DistanceMeters>{distance:.1}</DistanceMeters>\n"
            ));
        }
    }
    if opts.include_calories {
        if let Some(calories) = workout.calories {
            out.push_str(&format!(
                "        <Calories>{}</Calories>\n",
                calories.round() as u32
            ));
        }
    }
    out.push_str("        <Intensity>Active</Intensity>\n");
    out.push_str("        <TriggerMethod>Manual</TriggerMethod>\n");
    out.push_str("        <Track>\n");
    for sample in &track.samples {
        push_trackpoint(&mut out, start, sample);
    }
    out.push_str("        </Track>\n");
    out.push_str("      </Lap>\n");
    if opts.include_notes && !workout.metrics.is_empty() {
        out.push_str(&format!(
            "      <Notes>{}</Notes>\n",
            xml_escape(&metric_notes(workout))
        ));
    }
    out.push_str("    </Activity>\n");
    out.push_str("  </Activities>\n");
    out.push_str("</TrainingCenterDatabase>\n");
    out
}

fn push_trackpoint(out: &mut String, start: DateTime<Utc>, sample: &super::ResolvedSample) {
    let time = start + Duration::seconds(i64::from(sample.t_sec));
    out.push_str("          <Trackpoint>\n");
    out.push_str(&format!("            <Time>{}</Time>\n", iso(time)));
    if let Some(altitude) = sample.altitude_m {
        out.push_str(&format!(
            "            <AltitudeMeters>{altitude:.1}</AltitudeMeters>\n"
        ));
    }
    if let Some(distance) = sample.distance_m {
        out.push_str(&format!(
            "            <DistanceMeters>{distance:.1}</DistanceMeters>\n"
        ));
    }
    if let Some(hr) = sample.hr {
        out.push_str("            <HeartRateBpm>\n");
        out.push_str(&format!(
            "              <Value>{}</Value>\n",
            hr.round() as u32
        ));
        out.push_str("            </HeartRateBpm>\n");
    }
    if let Some(cadence) = sample.cadence {
        out.push_str(&format!(
            "            <Cadence>{}</Cadence>\n",
            cadence.round() as u32
        ));
    }
    if let Some(watts) = sample.watts {
        out.push_str("            <Extensions>\n");
        out.push_str("              <ns3:TPX>\n");
        out.push_str(&format!(
            "                <ns3:Watts>{}</ns3:Watts>\n",
            watts.round() as u32
        ));
        out.push_str("              </ns3:TPX>\n");
        out.push_str("            </Extensions>\n");
    }
    out.push_str("          </Trackpoint>\n");
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Free-text metric notes, key-sorted for stable output
fn metric_notes(workout: &Workout) -> String {
    let mut pairs: Vec<(&String, &f64)> = workout.metrics.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|(name, value)| format!("{name}: {}", fmt_number(**value)))
        .collect::<Vec<_>>()
        .join("; ")
}

fn fmt_number(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
