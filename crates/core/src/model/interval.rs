use serde::{Deserialize, Serialize};

/// How a correlated request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Ok,
    Error,
    /// No matching reply by end of capture.
    Pending,
}

/// The unit the layout and render engines operate on: one record mapped
/// onto the shared timeline.
///
/// `end == None` denotes an unterminated request; it is drawn as a dot
/// instead of a bar and excluded from duration aggregates. When both ends
/// are present, `start <= end` holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Start time in seconds, relative to the capture origin.
    pub start: f64,
    /// End time in seconds, relative to the capture origin.
    pub end: Option<f64>,
    /// Index into the owning pane's record store.
    pub record: usize,
    pub outcome: Outcome,
    /// Row within the group assigned by the overlap layout.
    pub stack_level: u32,
}

impl Interval {
    /// Duration in seconds, if the interval is terminated and well-formed.
    pub fn duration(&self) -> Option<f64> {
        let end = self.end?;
        let d = end - self.start;
        if d.is_finite() && d >= 0.0 { Some(d) } else { None }
    }

    /// Duration in microseconds.
    pub fn duration_us(&self) -> Option<f64> {
        self.duration().map(|d| d * 1_000_000.0)
    }

    /// Whether the interval intersects the closed time range `[lo, hi]`.
    pub fn intersects(&self, lo: f64, hi: f64) -> bool {
        let end = self.end.unwrap_or(self.start);
        !(end < lo || self.start > hi)
    }
}

/// A run of overlapping intervals collapsed into one span, shown on a
/// collapsed header row. `weight` counts the intervals merged in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedSpan {
    pub start: f64,
    pub end: f64,
    pub weight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_interval_has_no_duration() {
        let iv = Interval {
            start: 1.5,
            end: None,
            record: 0,
            outcome: Outcome::Pending,
            stack_level: 0,
        };
        assert_eq!(iv.duration(), None);
        assert_eq!(iv.duration_us(), None);
    }

    #[test]
    fn nan_end_is_treated_as_malformed() {
        let iv = Interval {
            start: 0.0,
            end: Some(f64::NAN),
            record: 0,
            outcome: Outcome::Ok,
            stack_level: 0,
        };
        assert_eq!(iv.duration(), None);
    }

    #[test]
    fn pending_intersects_as_point() {
        let iv = Interval {
            start: 5.0,
            end: None,
            record: 0,
            outcome: Outcome::Pending,
            stack_level: 0,
        };
        assert!(iv.intersects(4.0, 6.0));
        assert!(!iv.intersects(6.0, 8.0));
    }
}
