use crate::model::{Interval, MergedSpan};

/// Stack level cap per group row.
pub const MAX_STACK: u32 = 10;

/// Assign a stack level to each interval so that no two intervals on the
/// same level overlap visually. Returns the number of levels used.
///
/// Greedy first-fit in input (time) order: each level remembers the end
/// time of the last interval placed on it; a new interval takes the
/// lowest level whose end time is at or before its start, or the next
/// unused level. Ties break toward the lowest level, so the assignment is
/// deterministic for a fixed input order. Unterminated intervals occupy
/// only their start instant for this bookkeeping. Once every level is
/// busy, intervals pile onto the last one rather than growing without
/// bound.
///
/// This is greedy interval-graph coloring, not optimal packing.
pub fn assign_stack_levels(intervals: &mut [Interval]) -> u32 {
    let mut level_ends: Vec<f64> = Vec::new();
    let mut deepest: u32 = 0;

    for iv in intervals.iter_mut() {
        let mut level = level_ends.len();
        for (i, end) in level_ends.iter().enumerate() {
            if *end <= iv.start {
                level = i;
                break;
            }
        }
        if level >= MAX_STACK as usize {
            level = MAX_STACK as usize - 1;
        }

        let iv_end = match iv.end {
            Some(e) if e.is_finite() => e,
            _ => iv.start,
        };
        if level == level_ends.len() {
            level_ends.push(iv_end);
        } else {
            level_ends[level] = level_ends[level].max(iv_end);
        }

        iv.stack_level = level as u32;
        deepest = deepest.max(level as u32);
    }

    deepest + 1
}

/// Collapse a set of interval rows into disjoint spans for a collapsed
/// header: a rise/fall edge sweep over every well-formed interval. Weight
/// counts the intervals absorbed into each span. Malformed intervals
/// (unterminated, or end before start) are left out.
pub fn merge_spans(rows: &[&[Interval]]) -> Vec<MergedSpan> {
    #[derive(PartialEq, Eq, PartialOrd, Ord)]
    enum Edge {
        Rise,
        Fall,
    }

    let mut edges: Vec<(f64, Edge)> = Vec::new();
    for row in rows {
        for iv in row.iter() {
            if let Some(end) = iv.end
                && end.is_finite()
                && iv.start <= end
            {
                edges.push((iv.start, Edge::Rise));
                edges.push((end, Edge::Fall));
            }
        }
    }
    // Rising edges sort before falling at the same instant, so abutting
    // intervals fuse into one span.
    edges.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut merged = Vec::new();
    let mut level = 0u32;
    let mut start = 0.0f64;
    let mut weight = 0u32;

    for (t, edge) in edges {
        match edge {
            Edge::Rise => {
                if level == 0 {
                    start = t;
                }
                weight += 1;
                level += 1;
            }
            Edge::Fall => {
                level = level.saturating_sub(1);
                if level == 0 {
                    merged.push(MergedSpan {
                        start,
                        end: t,
                        weight,
                    });
                    weight = 0;
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    fn iv(start: f64, end: Option<f64>) -> Interval {
        Interval {
            start,
            end,
            record: 0,
            outcome: Outcome::Ok,
            stack_level: 0,
        }
    }

    #[test]
    fn overlap_pushes_to_next_level_and_rows_are_reused() {
        let mut intervals = vec![
            iv(0.0, Some(10.0)),
            iv(5.0, Some(15.0)),
            iv(20.0, Some(25.0)),
        ];
        let depth = assign_stack_levels(&mut intervals);
        assert_eq!(intervals[0].stack_level, 0);
        assert_eq!(intervals[1].stack_level, 1);
        // Level 0 freed up at t=10, so the third interval reuses it.
        assert_eq!(intervals[2].stack_level, 0);
        assert_eq!(depth, 2);
    }

    #[test]
    fn abutting_intervals_share_a_level() {
        let mut intervals = vec![iv(0.0, Some(5.0)), iv(5.0, Some(10.0))];
        let depth = assign_stack_levels(&mut intervals);
        assert_eq!(intervals[1].stack_level, 0);
        assert_eq!(depth, 1);
    }

    #[test]
    fn pending_interval_occupies_only_its_start() {
        let mut intervals = vec![iv(0.0, None), iv(0.5, Some(2.0))];
        let depth = assign_stack_levels(&mut intervals);
        assert_eq!(intervals[0].stack_level, 0);
        assert_eq!(intervals[1].stack_level, 0);
        assert_eq!(depth, 1);
    }

    #[test]
    fn depth_is_capped() {
        // Eleven intervals all covering the same range.
        let mut intervals: Vec<Interval> = (0..11).map(|_| iv(0.0, Some(100.0))).collect();
        let depth = assign_stack_levels(&mut intervals);
        assert_eq!(depth, MAX_STACK);
        assert!(intervals.iter().all(|i| i.stack_level < MAX_STACK));
    }

    #[test]
    fn layout_is_idempotent() {
        let build = || {
            vec![
                iv(0.0, Some(4.0)),
                iv(1.0, Some(2.0)),
                iv(1.5, Some(3.0)),
                iv(4.5, Some(5.0)),
            ]
        };
        let mut a = build();
        let mut b = build();
        assert_eq!(assign_stack_levels(&mut a), assign_stack_levels(&mut b));
        assert_eq!(a, b);
    }

    #[test]
    fn merge_collapses_overlaps_and_counts_weight() {
        let row_a = [iv(0.0, Some(10.0)), iv(5.0, Some(15.0))];
        let row_b = [iv(20.0, Some(25.0))];
        let merged = merge_spans(&[&row_a, &row_b]);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].start, merged[0].end), (0.0, 15.0));
        assert_eq!(merged[0].weight, 2);
        assert_eq!(merged[1].weight, 1);
    }

    #[test]
    fn merge_fuses_abutting_intervals() {
        let row = [iv(0.0, Some(5.0)), iv(5.0, Some(8.0))];
        let merged = merge_spans(&[&row]);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start, merged[0].end), (0.0, 8.0));
    }

    #[test]
    fn merge_ignores_malformed_intervals() {
        let row = [iv(0.0, None), iv(3.0, Some(2.0)), iv(4.0, Some(5.0))];
        let merged = merge_spans(&[&row]);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start, merged[0].end), (4.0, 5.0));
    }
}
