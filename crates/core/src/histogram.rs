use std::collections::HashMap;

use busvis_protocol::SharedStr;

/// Width added to a degenerate zero-width range, in microseconds, so the
/// bucket width never divides by zero.
const DEGENERATE_RANGE_EPS_US: f64 = 1e-2 * 1_000_000.0;

#[derive(Debug, Clone)]
pub struct HistogramConfig {
    pub num_buckets: usize,
    /// Each group gets its own duration range; otherwise the min/max over
    /// all groups is shared.
    pub per_group_range: bool,
    /// Cumulative-density fraction marking the fast tail. Negative
    /// disables tail thresholds.
    pub left_tail: f64,
    /// Cumulative-density fraction marking the slow tail, from the top.
    pub right_tail: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            num_buckets: 30,
            per_group_range: true,
            left_tail: -1.0,
            right_tail: -1.0,
        }
    }
}

/// Duration distribution of one group, over microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationHistogram {
    pub lo_us: f64,
    pub hi_us: f64,
    pub buckets: Vec<u32>,
}

impl DurationHistogram {
    pub fn bucket_width_us(&self) -> f64 {
        (self.hi_us - self.lo_us) / self.buckets.len() as f64
    }

    /// Bucket index for a duration, clamped into range so no sample is
    /// ever dropped.
    pub fn bucket_index(&self, duration_us: f64) -> usize {
        let width = self.bucket_width_us();
        if !(width > 0.0) || !duration_us.is_finite() {
            return 0;
        }
        let idx = (duration_us / width).floor();
        if idx < 0.0 {
            0
        } else {
            (idx as usize).min(self.buckets.len() - 1)
        }
    }

    pub fn total(&self) -> u32 {
        self.buckets.iter().sum()
    }

    pub fn max_count(&self) -> u32 {
        self.buckets.iter().copied().max().unwrap_or(0)
    }
}

/// Tail cutoffs derived from cumulative density, for color-coding strokes.
/// `frac` values are normalized bucket positions for thumbnail shading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TailThresholds {
    pub fast_below_us: Option<f64>,
    pub fast_frac: Option<f64>,
    pub slow_above_us: Option<f64>,
    pub slow_frac: Option<f64>,
}

/// Build one histogram per group from duration samples in microseconds.
///
/// Pending and malformed durations must already be filtered out by the
/// caller; they are excluded from aggregates by design. Groups with no
/// samples get no histogram.
pub fn compute_histograms(
    groups: &[(SharedStr, Vec<f64>)],
    config: &HistogramConfig,
) -> HashMap<SharedStr, DurationHistogram> {
    let mut global_lo = f64::INFINITY;
    let mut global_hi = f64::NEG_INFINITY;
    for (_, durations) in groups {
        for &d in durations {
            global_lo = global_lo.min(d);
            global_hi = global_hi.max(d);
        }
    }

    let mut out = HashMap::new();
    for (title, durations) in groups {
        if durations.is_empty() {
            continue;
        }
        let (mut lo, mut hi) = if config.per_group_range {
            durations.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(l, h), &d| {
                (l.min(d), h.max(d))
            })
        } else {
            (global_lo, global_hi)
        };
        if !lo.is_finite() || !hi.is_finite() {
            continue;
        }
        if lo == hi {
            hi = lo + DEGENERATE_RANGE_EPS_US;
        }

        let mut hist = DurationHistogram {
            lo_us: lo,
            hi_us: hi,
            buckets: vec![0; config.num_buckets.max(1)],
        };
        for &d in durations {
            let idx = hist.bucket_index(d);
            hist.buckets[idx] += 1;
        }
        out.insert(title.clone(), hist);
    }
    out
}

/// Walk the cumulative density and record where it crosses the tail
/// fractions. Disabled (all `None`) when the configured widths are
/// negative.
pub fn tail_thresholds(
    hist: &DurationHistogram,
    left_tail: f64,
    right_tail: f64,
) -> TailThresholds {
    let mut thresholds = TailThresholds::default();
    let total = hist.total();
    if total == 0 {
        return thresholds;
    }

    let len = hist.buckets.len() as f64;
    let span = hist.hi_us - hist.lo_us;
    let mut cum_before = 0.0f64;
    let mut cum_after = 0.0f64;

    for (i, &count) in hist.buckets.iter().enumerate() {
        if count == 0 {
            continue;
        }
        cum_before = cum_after;
        cum_after += f64::from(count) / f64::from(total);

        if left_tail >= 0.0 && cum_before < left_tail && cum_after >= left_tail {
            thresholds.fast_frac = Some(i as f64 / len);
            thresholds.fast_below_us = Some(hist.lo_us + span / len * i as f64);
        }
        if right_tail >= 0.0 && cum_before < 1.0 - right_tail && cum_after >= 1.0 - right_tail {
            let j = i as f64 - 1.0;
            thresholds.slow_frac = Some(j / len);
            thresholds.slow_above_us = Some(hist.lo_us + span / len * j);
        }
    }
    thresholds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(num_buckets: usize, per_group: bool) -> HistogramConfig {
        HistogramConfig {
            num_buckets,
            per_group_range: per_group,
            ..HistogramConfig::default()
        }
    }

    #[test]
    fn no_sample_dropped_after_clamping() {
        // Durations 1,1,2,3 µs over range [1,3] with 4 buckets: the raw
        // floor(d/width) indices run past the end and must clamp back in.
        let groups = vec![(SharedStr::from("6, 1"), vec![1.0, 1.0, 2.0, 3.0])];
        let hists = compute_histograms(&groups, &cfg(4, true));
        let hist = &hists["6, 1"];
        assert_eq!(hist.lo_us, 1.0);
        assert_eq!(hist.hi_us, 3.0);
        assert_eq!(hist.total(), 4);
    }

    #[test]
    fn degenerate_range_is_widened() {
        let groups = vec![(SharedStr::from("k"), vec![5.0, 5.0])];
        let hists = compute_histograms(&groups, &cfg(10, true));
        let hist = &hists["k"];
        assert!(hist.hi_us > hist.lo_us);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn global_range_spans_all_groups() {
        let groups = vec![
            (SharedStr::from("a"), vec![1.0]),
            (SharedStr::from("b"), vec![100.0]),
        ];
        let hists = compute_histograms(&groups, &cfg(10, false));
        assert_eq!(hists["a"].lo_us, 1.0);
        assert_eq!(hists["a"].hi_us, 100.0);
        assert_eq!(hists["b"].lo_us, 1.0);
    }

    #[test]
    fn empty_group_gets_no_histogram() {
        let groups = vec![(SharedStr::from("empty"), vec![])];
        let hists = compute_histograms(&groups, &cfg(10, true));
        assert!(hists.is_empty());
    }

    #[test]
    fn negative_tail_widths_disable_thresholds() {
        let hist = DurationHistogram {
            lo_us: 0.0,
            hi_us: 10.0,
            buckets: vec![5, 5, 5, 5],
        };
        let t = tail_thresholds(&hist, -1.0, -1.0);
        assert_eq!(t, TailThresholds::default());
    }

    #[test]
    fn tails_cross_at_cumulative_density() {
        // 100 samples: 5 in the first bucket, 90 spread, 5 in the last.
        let hist = DurationHistogram {
            lo_us: 0.0,
            hi_us: 100.0,
            buckets: vec![5, 45, 45, 5],
        };
        let t = tail_thresholds(&hist, 0.05, 0.05);
        assert_eq!(t.fast_frac, Some(0.0));
        assert_eq!(t.fast_below_us, Some(0.0));
        // 95% density is reached inside bucket 2; the cutoff anchors one
        // bucket back.
        assert_eq!(t.slow_frac, Some(0.25));
        assert_eq!(t.slow_above_us, Some(25.0));
    }
}
