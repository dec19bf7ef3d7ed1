//! Heart-rate anchors and series ordering
//!
//! The single-detail source carries heart rate as sparse, irregularly-timed
//! anchors rather than one value per sample. [`HrAnchors::hr_at`] projects
//! that sparse shape onto every sample offset by linear interpolation, clamping
//! outside the anchored range. Interpolation is a policy choice: the HR curve
//! shape must survive export instead of collapsing to a single average.

use crate::types::SeriesPoint;

/// A known (offset, heart rate) pair used as an interpolation endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrAnchor {
    pub t_sec: u32,
    pub hr: f64,
}

/// Sorted, per-second-deduplicated heart-rate anchors
#[derive(Debug, Clone, Default)]
pub struct HrAnchors {
    anchors: Vec<HrAnchor>,
}

impl HrAnchors {
    /// Build anchors from raw (timestamp, hr) pairs.
    ///
    /// Timestamps are rounded to the nearest second; the first value seen for
    /// a given second wins. The result is sorted ascending.
    pub fn from_raw(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut anchors: Vec<HrAnchor> = Vec::new();
        for (t, hr) in pairs {
            if !t.is_finite() || !hr.is_finite() || t < 0.0 {
                continue;
            }
            let t_sec = t.round() as u32;
            if anchors.iter().any(|a| a.t_sec == t_sec) {
                continue;
            }
            anchors.push(HrAnchor { t_sec, hr });
        }
        anchors.sort_by_key(|a| a.t_sec);
        Self { anchors }
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Heart rate at offset `t_sec`.
    ///
    /// Zero anchors yield `None`; one anchor is constant everywhere. Offsets
    /// at or outside the anchored range clamp to the boundary anchor's value.
    /// Strictly between adjacent anchors `a, b` the value is the linear
    /// interpolation `a.hr + (b.hr - a.hr) * (t - a.t) / (b.t - a.t)`, with
    /// the degenerate `b.t == a.t` window returning `b.hr`.
    pub fn hr_at(&self, t_sec: u32) -> Option<f64> {
        let first = self.anchors.first()?;
        let last = self.anchors.last()?;
        if t_sec <= first.t_sec {
            return Some(first.hr);
        }
        if t_sec >= last.t_sec {
            return Some(last.hr);
        }
        // First anchor with b.t >= t; its predecessor has a.t < t.
        let bi = self.anchors.partition_point(|a| a.t_sec < t_sec);
        let b = self.anchors[bi];
        let a = self.anchors[bi - 1];
        if b.t_sec == a.t_sec {
            return Some(b.hr);
        }
        let span = (b.t_sec - a.t_sec) as f64;
        let progress = (t_sec - a.t_sec) as f64;
        Some(a.hr + (b.hr - a.hr) * progress / span)
    }
}

/// Sort series points ascending by offset.
///
/// Stable, so duplicate offsets keep their relative order; encoders call this
/// defensively on every input.
pub fn sort_points(points: &mut [SeriesPoint]) {
    points.sort_by_key(|p| p.t_sec);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_anchors_yield_none() {
        let anchors = HrAnchors::from_raw([]);
        assert_eq!(anchors.hr_at(0), None);
        assert_eq!(anchors.hr_at(100), None);
    }

    #[test]
    fn single_anchor_is_constant() {
        let anchors = HrAnchors::from_raw([(30.0, 122.0)]);
        assert_eq!(anchors.hr_at(0), Some(122.0));
        assert_eq!(anchors.hr_at(30), Some(122.0));
        assert_eq!(anchors.hr_at(9999), Some(122.0));
    }

    #[test]
    fn interpolates_linearly_between_anchors() {
        let anchors = HrAnchors::from_raw([(0.0, 100.0), (10.0, 140.0)]);
        assert_eq!(anchors.hr_at(5), Some(120.0));
        assert_eq!(anchors.hr_at(1), Some(104.0));
        assert_eq!(anchors.hr_at(9), Some(136.0));
    }

    #[test]
    fn clamps_outside_anchor_range() {
        let anchors = HrAnchors::from_raw([(10.0, 100.0), (20.0, 150.0)]);
        assert_eq!(anchors.hr_at(0), Some(100.0));
        assert_eq!(anchors.hr_at(10), Some(100.0));
        assert_eq!(anchors.hr_at(20), Some(150.0));
        assert_eq!(anchors.hr_at(45), Some(150.0));
    }

    #[test]
    fn monotonic_between_anchors_for_arbitrary_spacing() {
        let anchors =
            HrAnchors::from_raw([(0.0, 90.0), (7.0, 120.0), (31.0, 96.0), (32.0, 170.0)]);
        // Rising segment
        let mut prev = anchors.hr_at(0).unwrap();
        for t in 1..=7 {
            let cur = anchors.hr_at(t).unwrap();
            assert!(cur >= prev, "expected non-decreasing at t={t}");
            prev = cur;
        }
        // Falling segment
        let mut prev = anchors.hr_at(7).unwrap();
        for t in 8..=31 {
            let cur = anchors.hr_at(t).unwrap();
            assert!(cur <= prev, "expected non-increasing at t={t}");
            prev = cur;
        }
        // Exact midpoint of the first segment is not sampled (7 is odd), but
        // the formula must match at every integer offset.
        let expected_t3 = 90.0 + (120.0 - 90.0) * 3.0 / 7.0;
        assert!((anchors.hr_at(3).unwrap() - expected_t3).abs() < 1e-9);
    }

    #[test]
    fn dedupes_by_rounded_second() {
        let anchors = HrAnchors::from_raw([(4.6, 100.0), (5.2, 130.0), (10.0, 140.0)]);
        // Both 4.6 and 5.2 round to 5; first one wins.
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors.hr_at(5), Some(100.0));
    }

    #[test]
    fn drops_negative_and_non_finite_pairs() {
        let anchors = HrAnchors::from_raw([(-3.0, 80.0), (f64::NAN, 90.0), (2.0, 110.0)]);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors.hr_at(50), Some(110.0));
    }

    #[test]
    fn sort_is_total_and_idempotent() {
        let mut points = vec![
            SeriesPoint::at(30),
            SeriesPoint::at(0),
            SeriesPoint::at(10),
            SeriesPoint::at(10),
        ];
        sort_points(&mut points);
        let offsets: Vec<u32> = points.iter().map(|p| p.t_sec).collect();
        assert_eq!(offsets, vec![0, 10, 10, 30]);
        let once = points.clone();
        sort_points(&mut points);
        assert_eq!(points, once);
    }
}
