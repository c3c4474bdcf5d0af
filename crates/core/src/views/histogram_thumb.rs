use std::collections::BTreeSet;

use busvis_protocol::{Baseline, Point, Rect, RenderCommand, SharedStr, TextAlign, ThemeToken};

use crate::histogram::{DurationHistogram, TailThresholds};
use crate::timeline::PaneGeometry;
use crate::views::time_axis::FONT_SIZE;

/// Stroke inset of the thumbnail frame.
const PAD: f64 = 1.0;
/// Bar inset, preserving a little space at both ends.
const PAD2: f64 = 2.0;

/// Bound labels autoscale from microseconds to milliseconds.
fn bound_label(us: f64) -> String {
    if us > 1000.0 {
        format!("{:.1}ms", us / 1000.0)
    } else {
        format!("{us:.1}us")
    }
}

/// Emit one group's duration-distribution thumbnail centered on
/// `(geo.hist_x, y_mid)`: background, frame, count bars scaled to the
/// tallest bucket, tail shading, and the range labels at both sides.
pub fn render(
    hist: &DurationHistogram,
    thresholds: &TailThresholds,
    geo: &PaneGeometry,
    y_mid: f64,
) -> Vec<RenderCommand> {
    let w = geo.hist_w;
    let h = geo.line_spacing;
    let x0 = geo.hist_x - w / 2.0;
    let y0 = y_mid - h / 2.0;
    let mut cmds = Vec::new();

    cmds.push(RenderCommand::DrawRect {
        rect: Rect::new(x0, y0, w, h),
        fill: Some(ThemeToken::HistogramBackground),
        stroke: None,
        stroke_width: 0.0,
    });
    cmds.push(RenderCommand::DrawRect {
        rect: Rect::new(x0 + PAD, y0 + PAD, w - 2.0 * PAD, h - 2.0 * PAD),
        fill: None,
        stroke: Some(ThemeToken::HistogramFrame),
        stroke_width: 1.0,
    });

    let max_count = hist.max_count();
    if max_count > 0 {
        let len = hist.buckets.len() as f64;
        let inner_w = w - 2.0 * PAD2;
        for (i, &count) in hist.buckets.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let bx0 = x0 + PAD2 + inner_w * i as f64 / len;
            let bx1 = x0 + PAD2 + inner_w * (i as f64 + 1.0) / len;
            let bar_h = h * f64::from(count) / f64::from(max_count);
            cmds.push(RenderCommand::DrawRect {
                rect: Rect::new(bx0, y0 + h - bar_h, bx1 - bx0, bar_h),
                fill: Some(ThemeToken::HistogramBar),
                stroke: None,
                stroke_width: 0.0,
            });
        }

        if let Some(frac) = thresholds.fast_frac {
            cmds.push(RenderCommand::DrawRect {
                rect: Rect::new(x0 + PAD2, y0, inner_w * frac, h),
                fill: Some(ThemeToken::HistogramGoodTail),
                stroke: None,
                stroke_width: 0.0,
            });
        }
        if let Some(frac) = thresholds.slow_frac {
            cmds.push(RenderCommand::DrawRect {
                rect: Rect::new(x0 + PAD2 + inner_w * frac, y0, inner_w * (1.0 - frac), h),
                fill: Some(ThemeToken::HistogramBadTail),
                stroke: None,
                stroke_width: 0.0,
            });
        }
    }

    cmds.push(RenderCommand::DrawText {
        position: Point::new(x0, y_mid),
        text: SharedStr::from(bound_label(hist.lo_us)),
        color: ThemeToken::AxisText,
        font_size: FONT_SIZE,
        align: TextAlign::Right,
        baseline: Baseline::Middle,
    });
    cmds.push(RenderCommand::DrawText {
        position: Point::new(x0 + w, y_mid),
        text: SharedStr::from(bound_label(hist.hi_us)),
        color: ThemeToken::AxisText,
        font_size: FONT_SIZE,
        align: TextAlign::Left,
        baseline: Baseline::Middle,
    });

    cmds
}

/// Dots over the thumbnail marking buckets hit by the current selection,
/// colored by which side of the tail thresholds the bucket falls on.
pub fn bucket_marks(
    num_buckets: usize,
    marks: &BTreeSet<usize>,
    thresholds: &TailThresholds,
    geo: &PaneGeometry,
    y_mid: f64,
) -> Vec<RenderCommand> {
    if num_buckets == 0 {
        return Vec::new();
    }
    let len = num_buckets as f64;
    let radius = geo.line_spacing * 0.17;
    marks
        .iter()
        .map(|&bucket| {
            let frac = (bucket as f64 / len).clamp(0.0, 1.0);
            let color = match (thresholds.fast_frac, thresholds.slow_frac) {
                (Some(fast), _) if frac < fast => ThemeToken::BucketMarkGood,
                (_, Some(slow)) if frac > slow => ThemeToken::BucketMarkBad,
                _ => ThemeToken::BucketMarkNeutral,
            };
            RenderCommand::DrawCircle {
                center: Point::new(geo.hist_x - geo.hist_w / 2.0 + geo.hist_w * frac, y_mid),
                radius,
                color,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist() -> DurationHistogram {
        DurationHistogram {
            lo_us: 100.0,
            hi_us: 2500.0,
            buckets: vec![3, 0, 1, 2],
        }
    }

    #[test]
    fn bars_only_for_nonempty_buckets() {
        let cmds = render(
            &hist(),
            &TailThresholds::default(),
            &PaneGeometry::default(),
            100.0,
        );
        let bars = cmds
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RenderCommand::DrawRect { fill: Some(ThemeToken::HistogramBar), .. }
                )
            })
            .count();
        assert_eq!(bars, 3);
    }

    #[test]
    fn bound_labels_autoscale() {
        assert_eq!(bound_label(100.0), "100.0us");
        assert_eq!(bound_label(2500.0), "2.5ms");
    }

    #[test]
    fn tail_shading_follows_thresholds() {
        let thresholds = TailThresholds {
            fast_below_us: Some(200.0),
            fast_frac: Some(0.25),
            slow_above_us: Some(2000.0),
            slow_frac: Some(0.75),
        };
        let cmds = render(&hist(), &thresholds, &PaneGeometry::default(), 100.0);
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::DrawRect { fill: Some(ThemeToken::HistogramGoodTail), .. }
        )));
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::DrawRect { fill: Some(ThemeToken::HistogramBadTail), .. }
        )));
    }

    #[test]
    fn bucket_marks_color_by_tail_side() {
        let thresholds = TailThresholds {
            fast_below_us: Some(200.0),
            fast_frac: Some(0.3),
            slow_above_us: Some(2000.0),
            slow_frac: Some(0.7),
        };
        let marks: BTreeSet<usize> = [0, 5, 9].into_iter().collect();
        let cmds = bucket_marks(10, &marks, &thresholds, &PaneGeometry::default(), 50.0);
        let colors: Vec<ThemeToken> = cmds
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawCircle { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(
            colors,
            vec![
                ThemeToken::BucketMarkGood,
                ThemeToken::BucketMarkNeutral,
                ThemeToken::BucketMarkBad
            ]
        );
    }

    #[test]
    fn empty_histogram_draws_frame_and_labels_only() {
        let empty = DurationHistogram {
            lo_us: 0.0,
            hi_us: 1.0,
            buckets: vec![0; 4],
        };
        let cmds = render(
            &empty,
            &TailThresholds::default(),
            &PaneGeometry::default(),
            10.0,
        );
        assert!(!cmds.iter().any(|c| matches!(
            c,
            RenderCommand::DrawRect { fill: Some(ThemeToken::HistogramBar), .. }
        )));
    }
}
