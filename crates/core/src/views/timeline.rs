use std::collections::{BTreeSet, HashMap};

use busvis_protocol::{Baseline, Point, Rect, RenderCommand, SharedStr, TextAlign, ThemeToken};

use crate::interact::{HoverSide, ZONE_PAD};
use crate::model::{Interval, MergedSpan, Outcome};
use crate::report;
use crate::timeline::{PaneGeometry, RowStats, TimelineEngine};
use crate::tooltip;
use crate::viewport::TimeWindow;
use crate::views::histogram_thumb;
use crate::views::time_axis::{self, CHAR_W, FONT_SIZE};

/// Pixel distance within which the cursor still picks up an interval.
const HOVER_X_TOLERANCE: f64 = 4.0;

/// Adjacent strokes closer than this merge into a single draw call, so
/// the command count stays bounded when zoomed far out.
const MERGE_THRESH: f64 = 1.0;

/// Sub-pixel merge distance for collapsed-header strips.
const STRIP_MERGE_THRESH: f64 = 0.5;

const TOOLTIP_PAD: f64 = 2.0;
const TOOLTIP_DELTA_Y: f64 = 14.0;

/// A run of sub-pixel-adjacent interval strokes pending one draw call.
struct StrokeCluster {
    begin: f64,
    end: f64,
    color: ThemeToken,
}

/// The full redraw pass for one pane.
///
/// Total over arbitrary data: malformed intervals degrade to pending
/// markers, empty panes produce just the furniture. Called only when the
/// pane is dirty; the engine caches the returned list.
pub fn render(eng: &mut TimelineEngine) -> Vec<RenderCommand> {
    let geo = eng.geometry.clone();
    let window = eng.window;
    let prec = time_axis::precision(window.extent());
    let height = geo.height;
    let line_h = geo.line_height;
    let mut cmds: Vec<RenderCommand> = Vec::new();

    if eng.highlight_dirty {
        eng.highlighted_records = report::highlighted_record_indices(eng);
        eng.highlight_dirty = false;
    }
    let highlight = eng.highlight_bounds();
    let aggregate_selection = highlight.is_some();

    // Hovered-row backdrop.
    if let Some(visible) = eng.mouse.hovered_visible_row
        && eng.visual_to_data_row(eng.scroll_row + visible).is_some()
    {
        let dy = geo.y_begin() + geo.line_spacing * visible as f64 - geo.line_spacing / 2.0;
        cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, dy, geo.right_margin(), geo.line_spacing),
            fill: Some(ThemeToken::RowHover),
            stroke: None,
            stroke_width: 0.0,
        });
    }

    // Hot-strip backdrop while the cursor is over a horizontal scrollbar.
    match eng.mouse.side {
        Some(HoverSide::TopScrollStrip) => cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(geo.left_margin, 0.0, geo.timeline_width(), geo.top_strip_height()),
            fill: Some(ThemeToken::ScrollStripHover),
            stroke: None,
            stroke_width: 0.0,
        }),
        Some(HoverSide::BottomScrollStrip) => cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(
                geo.left_margin,
                height - geo.bottom_strip_height(),
                geo.timeline_width(),
                geo.bottom_strip_height(),
            ),
            fill: Some(ThemeToken::ScrollStripHover),
            stroke: None,
            stroke_width: 0.0,
        }),
        _ => {}
    }

    cmds.extend(time_axis::render(&geo, &window));
    render_gutter_headers(eng, &geo, &mut cmds);

    // --- Row pass ------------------------------------------------------

    let tvh = eng.total_visual_height();
    let mut row_stats: HashMap<usize, RowStats> = HashMap::new();
    let mut hist_marks: HashMap<SharedStr, BTreeSet<usize>> = HashMap::new();
    // (display row, y center) for every rendered line.
    let mut rendered_lines: Vec<(usize, f64)> = Vec::new();
    let mut hovered: Option<Interval> = None;
    let mut title_end = eng.scroll_row;

    if tvh > 0 {
        // Rewind to the first visual line of the starting display row so
        // per-row aggregates include the lines scrolled off the top.
        let mut j0 = eng.scroll_row.min(tvh - 1);
        while j0 > 0 && eng.visual_to_data_row(j0).is_some_and(|(_, off)| off > 0) {
            j0 -= 1;
        }

        let mut y = geo.y_begin();
        let mut last_row = usize::MAX;

        for j in j0..tvh {
            let Some((row_idx, offset)) = eng.visual_to_data_row(j) else {
                break;
            };
            let in_viewport = j >= eng.scroll_row && y <= height;
            let row = eng.rows[row_idx].clone();
            let stats = row_stats.entry(row_idx).or_default();

            if in_viewport && (row_idx != last_row || j == eng.scroll_row) {
                render_row_label(eng, &geo, &row.title, row.description, row.header, y, &mut cmds);
            }
            last_row = row_idx;

            let dy0 = y - line_h / 2.0;
            let dy1 = y + line_h / 2.0;
            let mut left_overflow = 0u32;
            let mut right_overflow = 0u32;

            if row.header {
                let collapsed = eng.collapsed.get(&row.title).copied().unwrap_or(false);
                if in_viewport {
                    render_header_chrome(&geo, &row.title, row.interval_rows.len(), collapsed, y, &mut cmds);
                }
                // Children always feed the header's aggregate line; the
                // merged strips themselves show only while collapsed.
                render_merged_strips(
                    &row.merged,
                    &geo,
                    &window,
                    highlight,
                    aggregate_selection,
                    collapsed && in_viewport,
                    dy0,
                    stats,
                    &mut cmds,
                );
            } else if let Some(&interval_row) = row.interval_rows.first() {
                let thresholds = eng.thresholds.get(&row.title).copied().unwrap_or_default();
                let histogram = eng.histograms.get(&row.title);
                let mut cluster: Option<StrokeCluster> = None;

                for iv in &eng.intervals[interval_row] {
                    if iv.stack_level as usize != offset {
                        continue;
                    }
                    let is_highlighted =
                        highlight.is_some_and(|(t0, t1)| iv.intersects(t0, t1));
                    let counted = !aggregate_selection || is_highlighted;

                    // NaN or inverted durations degrade to pending dots.
                    let end = iv.duration().map(|d| iv.start + d);

                    match end {
                        Some(e) if e < window.lo => {
                            left_overflow += 1;
                            continue;
                        }
                        None if iv.start < window.lo => {
                            left_overflow += 1;
                            continue;
                        }
                        _ if iv.start > window.hi => {
                            right_overflow += 1;
                            continue;
                        }
                        _ => {}
                    }

                    let dx0 = geo.time_to_x(iv.start, &window);

                    let is_hovered = hovered.is_none()
                        && eng.mouse.y.is_some_and(|my| my >= dy0 && my <= dy1)
                        && {
                            let dx1 = end.map_or(dx0, |e| geo.time_to_x(e, &window));
                            eng.mouse.x >= dx0 - HOVER_X_TOLERANCE
                                && eng.mouse.x <= dx1 + HOVER_X_TOLERANCE
                        };
                    if is_hovered {
                        hovered = Some(*iv);
                    }

                    let Some(e) = end else {
                        if in_viewport {
                            cmds.push(RenderCommand::DrawCircle {
                                center: Point::new(dx0, y),
                                radius: geo.line_spacing * 0.17,
                                color: if is_hovered {
                                    ThemeToken::PendingHover
                                } else {
                                    ThemeToken::PendingFill
                                },
                            });
                        }
                        if counted {
                            stats.failed += 1;
                        }
                        continue;
                    };

                    let dx1 = geo.time_to_x(e, &window);
                    let dw = (dx1 - dx0).max(0.0);

                    if in_viewport && is_highlighted {
                        cmds.push(RenderCommand::DrawRect {
                            rect: Rect::new(dx0, dy0, dw, line_h),
                            fill: Some(ThemeToken::HighlightOverlay),
                            stroke: None,
                            stroke_width: 0.0,
                        });
                    }
                    if in_viewport && is_hovered {
                        cmds.push(RenderCommand::DrawRect {
                            rect: Rect::new(dx0, dy0, dw, line_h),
                            fill: Some(ThemeToken::HoverFill),
                            stroke: None,
                            stroke_width: 0.0,
                        });
                    }

                    let duration_us = (e - iv.start) * 1_000_000.0;
                    let stroke = if iv.outcome == Outcome::Error {
                        if in_viewport {
                            cmds.push(RenderCommand::DrawRect {
                                rect: Rect::new(dx0, dy0, dw, line_h),
                                fill: Some(ThemeToken::ErrorFill),
                                stroke: None,
                                stroke_width: 0.0,
                            });
                        }
                        ThemeToken::ErrorStroke
                    } else if thresholds.fast_below_us.is_some_and(|t| duration_us < t) {
                        ThemeToken::IntervalFast
                    } else if thresholds.slow_above_us.is_some_and(|t| duration_us > t) {
                        ThemeToken::IntervalSlow
                    } else {
                        ThemeToken::IntervalStroke
                    };

                    // Coalesce strokes closer than one pixel.
                    cluster = Some(match cluster {
                        Some(c) if dx0 - c.end <= MERGE_THRESH => StrokeCluster {
                            begin: c.begin,
                            end: c.end.max(dx0 + dw),
                            color: c.color,
                        },
                        Some(c) => {
                            if in_viewport {
                                flush_cluster(&c, dy0, line_h, &mut cmds);
                            }
                            StrokeCluster { begin: dx0, end: dx0 + dw, color: stroke }
                        }
                        None => StrokeCluster { begin: dx0, end: dx0 + dw, color: stroke },
                    });

                    if counted {
                        stats.visible += 1;
                        stats.total_seconds += e - iv.start;
                        if let Some(hist) = histogram {
                            hist_marks
                                .entry(row.title.clone())
                                .or_default()
                                .insert(hist.bucket_index(duration_us));
                        }
                    }
                }
                if in_viewport && let Some(c) = cluster {
                    flush_cluster(&c, dy0, line_h, &mut cmds);
                }
            }

            if in_viewport {
                render_overflow_markers(
                    eng,
                    &geo,
                    j,
                    y,
                    left_overflow,
                    right_overflow,
                    &mut cmds,
                );
                rendered_lines.push((row_idx, y));
                title_end = j;
                y += geo.line_spacing;
            }
            if y > height && offset == 0 {
                break;
            }
        }
    }

    // Per-row aggregates and selection dots over the thumbnails, drawn at
    // each display row's first rendered line.
    let mut last_row = usize::MAX;
    for &(row_idx, y) in &rendered_lines {
        if row_idx == last_row {
            continue;
        }
        last_row = row_idx;
        let stats = row_stats.get(&row_idx).copied().unwrap_or_default();
        render_row_aggregate(&stats, prec, y, &mut cmds);

        if eng.show_distribution {
            let title = &eng.rows[row_idx].title;
            if let (Some(hist), Some(marks)) =
                (eng.histograms.get(title), hist_marks.get(title))
            {
                let thresholds = eng.thresholds.get(title).copied().unwrap_or_default();
                cmds.extend(histogram_thumb::bucket_marks(
                    hist.buckets.len(),
                    marks,
                    &thresholds,
                    &geo,
                    y,
                ));
            }
        }
    }

    // Vertical scrollbar, when some rows are off-screen.
    let title_start = eng.scroll_row;
    if tvh > 0 && !(title_start == 0 && title_end == tvh - 1) {
        let y0 = title_start as f64 * height / tvh as f64;
        let y1 = (1 + title_end) as f64 * height / tvh as f64;
        cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, y0, geo.scroll_bar_width, y1 - y0),
            fill: Some(if eng.mouse.is_dragging_scrollbar() {
                ThemeToken::ScrollBarActive
            } else {
                ThemeToken::ScrollBar
            }),
            stroke: None,
            stroke_width: 0.0,
        });
        eng.scrollbar = Some((y0, y1));
    } else {
        eng.scrollbar = None;
    }

    if let Some((t0, t1)) = highlight {
        render_highlight_overlay(&geo, &window, t0, t1, prec, &mut cmds);
    }
    render_hover_cursor(eng, &geo, &window, prec, &mut cmds);

    if let Some(iv) = hovered
        && let Some(lines) = tooltip::lines(&eng.records, &iv, prec)
    {
        render_tooltip(eng, &geo, &lines, &mut cmds);
    }

    eng.row_stats = row_stats;
    eng.hist_highlight = hist_marks;
    cmds
}

fn flush_cluster(cluster: &StrokeCluster, dy0: f64, line_h: f64, cmds: &mut Vec<RenderCommand>) {
    cmds.push(RenderCommand::DrawRect {
        rect: Rect::new(cluster.begin, dy0, (cluster.end - cluster.begin).max(1.0), line_h),
        fill: None,
        stroke: Some(cluster.color),
        stroke_width: 0.5,
    });
}

/// Column title, histogram legend and the aggregate-gutter header.
fn render_gutter_headers(eng: &TimelineEngine, geo: &PaneGeometry, cmds: &mut Vec<RenderCommand>) {
    let title_limit = title_char_limit(eng, geo);
    for (i, chunk) in wrap_chars(&eng.column_title(), title_limit).into_iter().enumerate() {
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.left_margin - 3.0, 3.0 + i as f64 * geo.line_height),
            text: SharedStr::from(chunk),
            color: ThemeToken::RowLabel,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline: Baseline::Top,
        });
    }

    let scope_color = if eng.is_highlighted() {
        ThemeToken::HighlightText
    } else {
        ThemeToken::RowLabel
    };

    if eng.show_distribution {
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.hist_x, geo.text_y0),
            text: SharedStr::from("Time Distribution"),
            color: ThemeToken::RowLabel,
            font_size: FONT_SIZE,
            align: TextAlign::Center,
            baseline: Baseline::Top,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.hist_x, geo.text_y0 + geo.line_spacing - 2.0),
            text: SharedStr::from("In dataset /"),
            color: ThemeToken::RowLabel,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline: Baseline::Top,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.hist_x, geo.text_y0 + geo.line_spacing - 2.0),
            text: SharedStr::from(if eng.is_highlighted() {
                " In selection"
            } else {
                " In viewport"
            }),
            color: scope_color,
            font_size: FONT_SIZE,
            align: TextAlign::Left,
            baseline: Baseline::Top,
        });
    }

    cmds.push(RenderCommand::DrawText {
        position: Point::new(3.0, geo.text_y0),
        text: SharedStr::from("# / time"),
        color: scope_color,
        font_size: FONT_SIZE,
        align: TextAlign::Left,
        baseline: Baseline::Top,
    });
    cmds.push(RenderCommand::DrawText {
        position: Point::new(3.0, geo.text_y0 + geo.line_spacing - 2.0),
        text: SharedStr::from(if eng.is_highlighted() { "in selection" } else { "in viewport" }),
        color: scope_color,
        font_size: FONT_SIZE,
        align: TextAlign::Left,
        baseline: Baseline::Top,
    });
}

fn render_row_label(
    eng: &TimelineEngine,
    geo: &PaneGeometry,
    title: &SharedStr,
    description: Option<&'static str>,
    header: bool,
    y: f64,
    cmds: &mut Vec<RenderCommand>,
) {
    let mut desc_width = 0.0;
    if let Some(desc) = description {
        let text = format!(" ({desc})");
        desc_width = text.len() as f64 * CHAR_W;
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.left_margin - 3.0, y),
            text: SharedStr::from(text),
            color: ThemeToken::RowLabelDim,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline: Baseline::Middle,
        });
    }

    if eng.show_distribution
        && let (Some(hist), Some(thresholds)) =
            (eng.histograms.get(title), eng.thresholds.get(title))
    {
        cmds.extend(histogram_thumb::render(hist, thresholds, geo, y));
    }

    // Header titles are drawn with the header chrome instead.
    if !header {
        let limit = title_char_limit(eng, geo);
        let mut text = title.to_string();
        if text.len() > limit {
            text.truncate(limit);
            text.push_str("...");
        }
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.left_margin - 3.0 - desc_width, y),
            text: SharedStr::from(text),
            color: ThemeToken::RowLabel,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline: Baseline::Middle,
        });
    }
}

/// Header band, collapse chevron and the "title (N)" label.
fn render_header_chrome(
    geo: &PaneGeometry,
    title: &SharedStr,
    child_count: usize,
    collapsed: bool,
    y: f64,
    cmds: &mut Vec<RenderCommand>,
) {
    let line_h = geo.line_height;
    let dy0 = y - line_h / 2.0;
    let dy1 = y + line_h / 2.0;

    if collapsed {
        let x0 = geo.left_margin - line_h / 2.0;
        cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, dy0, x0, line_h),
            fill: Some(ThemeToken::HeaderFill),
            stroke: None,
            stroke_width: 0.0,
        });
        // Chevron pointing right while children are hidden.
        cmds.push(RenderCommand::DrawTriangle {
            points: [
                Point::new(x0, dy0),
                Point::new(x0 + line_h / 2.0, y),
                Point::new(x0, dy1),
            ],
            color: ThemeToken::HeaderFill,
        });
    } else {
        let x0 = geo.left_margin - line_h;
        cmds.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, dy0, x0, line_h),
            fill: Some(ThemeToken::HeaderFill),
            stroke: None,
            stroke_width: 0.0,
        });
        cmds.push(RenderCommand::DrawTriangle {
            points: [
                Point::new(x0, dy0),
                Point::new(x0, dy1),
                Point::new(x0 + line_h, dy1),
            ],
            color: ThemeToken::HeaderFill,
        });
        cmds.push(RenderCommand::DrawLine {
            from: Point::new(0.0, dy1),
            to: Point::new(geo.right_margin(), dy1),
            color: ThemeToken::HeaderFill,
            width: 1.5,
        });
    }

    cmds.push(RenderCommand::DrawText {
        position: Point::new(geo.left_margin - line_h, y),
        text: SharedStr::from(format!("{title} ({child_count})")),
        color: ThemeToken::HeaderText,
        font_size: FONT_SIZE,
        align: TextAlign::Right,
        baseline: Baseline::Middle,
    });
}

/// Disjoint merged spans on a header's strip. Aggregates always count;
/// drawing happens only while the header is collapsed, with the same
/// sub-pixel coalescing as the data rows.
#[allow(clippy::too_many_arguments)]
fn render_merged_strips(
    merged: &[MergedSpan],
    geo: &PaneGeometry,
    window: &TimeWindow,
    highlight: Option<(f64, f64)>,
    aggregate_selection: bool,
    draw: bool,
    dy0: f64,
    stats: &mut RowStats,
    cmds: &mut Vec<RenderCommand>,
) {
    let mut pending: Option<(f64, f64)> = None;
    for span in merged {
        let is_highlighted =
            highlight.is_some_and(|(t0, t1)| !(span.end < t0 || span.start > t1));
        if !aggregate_selection || is_highlighted {
            stats.visible += span.weight;
            stats.total_seconds += span.end - span.start;
        }
        if span.end < window.lo || span.start > window.hi || !draw {
            continue;
        }
        let dx0 = geo.time_to_x(span.start, window);
        let dx1 = geo.time_to_x(span.end, window).max(dx0 + 1.0);
        pending = Some(match pending {
            Some((b, e)) if dx0 - e <= STRIP_MERGE_THRESH => (b, e.max(dx1)),
            Some((b, e)) => {
                cmds.push(strip_rect(b, e, dy0, geo.line_height));
                (dx0, dx1)
            }
            None => (dx0, dx1),
        });
    }
    if let Some((b, e)) = pending {
        cmds.push(strip_rect(b, e, dy0, geo.line_height));
    }
}

fn strip_rect(x0: f64, x1: f64, dy0: f64, line_h: f64) -> RenderCommand {
    RenderCommand::DrawRect {
        rect: Rect::new(x0, dy0, x1 - x0, line_h),
        fill: Some(ThemeToken::MergedStrip),
        stroke: None,
        stroke_width: 0.0,
    }
}

/// Triangle markers with counts for intervals outside the viewport.
fn render_overflow_markers(
    eng: &TimelineEngine,
    geo: &PaneGeometry,
    j: usize,
    y: f64,
    left: u32,
    right: u32,
    cmds: &mut Vec<RenderCommand>,
) {
    let h = geo.line_spacing;
    let hovered_line = eng
        .mouse
        .hovered_visible_row
        .map(|visible| visible + eng.scroll_row);

    if left > 0 {
        let color = if hovered_line == Some(j) && eng.mouse.side == Some(HoverSide::LeftOverflow) {
            ThemeToken::OverflowMarkerActive
        } else {
            ThemeToken::OverflowMarker
        };
        let x = geo.left_margin + ZONE_PAD;
        cmds.push(RenderCommand::DrawTriangle {
            points: [
                Point::new(x + h / 2.0, y - h / 2.0),
                Point::new(x, y),
                Point::new(x + h / 2.0, y + h / 2.0),
            ],
            color,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(x + ZONE_PAD + h / 2.0, y),
            text: SharedStr::from(format!("+{left}")),
            color,
            font_size: FONT_SIZE,
            align: TextAlign::Left,
            baseline: Baseline::Middle,
        });
    }

    if right > 0 {
        let color = if hovered_line == Some(j) && eng.mouse.side == Some(HoverSide::RightOverflow) {
            ThemeToken::OverflowMarkerActive
        } else {
            ThemeToken::OverflowMarker
        };
        let x = geo.right_margin() - ZONE_PAD;
        cmds.push(RenderCommand::DrawTriangle {
            points: [
                Point::new(x - h / 2.0, y - h / 2.0),
                Point::new(x, y),
                Point::new(x - h / 2.0, y + h / 2.0),
            ],
            color,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(x - ZONE_PAD - h / 2.0, y),
            text: SharedStr::from(format!("+{right}")),
            color,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline: Baseline::Middle,
        });
    }
}

/// "count / time" gutter text for one display row, at its first line.
fn render_row_aggregate(stats: &RowStats, prec: usize, y: f64, cmds: &mut Vec<RenderCommand>) {
    let time_desc = if stats.total_seconds < 1.0 {
        format!("{:.prec$}ms", stats.total_seconds * 1000.0)
    } else {
        format!("{:.prec$}s", stats.total_seconds)
    };
    let text = if stats.failed > 0 {
        format!("{}+{} / {}", stats.visible, stats.failed, time_desc)
    } else {
        format!("{} / {}", stats.visible, time_desc)
    };
    cmds.push(RenderCommand::DrawText {
        position: Point::new(3.0, y),
        text: SharedStr::from(text),
        color: ThemeToken::RowLabel,
        font_size: FONT_SIZE,
        align: TextAlign::Left,
        baseline: Baseline::Middle,
    });
}

/// Translucent selection band plus its boundary and duration labels.
fn render_highlight_overlay(
    geo: &PaneGeometry,
    window: &TimeWindow,
    t0: f64,
    t1: f64,
    prec: usize,
    cmds: &mut Vec<RenderCommand>,
) {
    let x0 = geo.time_to_x(t0, window);
    let x1 = geo.time_to_x(t1, window);
    cmds.push(RenderCommand::DrawRect {
        rect: Rect::new(x0, 0.0, x1 - x0, geo.height),
        fill: Some(ThemeToken::HighlightOverlay),
        stroke: None,
        stroke_width: 0.0,
    });

    let label0 = format!("{t0:.prec$}s");
    let label1 = format!("{t1:.prec$}s");
    // Boundary labels go outside the band when it is too narrow to hold
    // them both.
    let fits = x1 - x0 > (label0.len() + label1.len()) as f64 * CHAR_W;
    let (align0, align1) = if fits {
        (TextAlign::Left, TextAlign::Right)
    } else {
        (TextAlign::Right, TextAlign::Left)
    };
    let label_y = geo.line_spacing + geo.text_y0;
    cmds.push(RenderCommand::DrawText {
        position: Point::new(x0, label_y),
        text: SharedStr::from(label0),
        color: ThemeToken::HighlightText,
        font_size: FONT_SIZE,
        align: align0,
        baseline: Baseline::Top,
    });
    cmds.push(RenderCommand::DrawText {
        position: Point::new(x1, label_y),
        text: SharedStr::from(label1),
        color: ThemeToken::HighlightText,
        font_size: FONT_SIZE,
        align: align1,
        baseline: Baseline::Top,
    });
    cmds.push(RenderCommand::DrawText {
        position: Point::new((x0 + x1) / 2.0, geo.height - geo.line_spacing * 2.0),
        text: SharedStr::from(format!("Duration: {:.prec$}s", t1 - t0)),
        color: ThemeToken::HighlightText,
        font_size: FONT_SIZE,
        align: TextAlign::Center,
        baseline: Baseline::Middle,
    });
}

/// Vertical cursor line with its timestamp, suppressed over the hot
/// strips.
fn render_hover_cursor(
    eng: &TimelineEngine,
    geo: &PaneGeometry,
    window: &TimeWindow,
    prec: usize,
    cmds: &mut Vec<RenderCommand>,
) {
    if !eng.mouse.hovered || eng.mouse.side.is_some() {
        return;
    }
    let x = eng.mouse.x;
    let (y0, y1) = if eng.is_highlighted() {
        (0.0, geo.height)
    } else {
        (geo.line_spacing * 2.0, geo.height - geo.line_spacing * 2.0)
    };
    cmds.push(RenderCommand::DrawLine {
        from: Point::new(x, y0),
        to: Point::new(x, y1),
        color: ThemeToken::CursorLine,
        width: 1.0,
    });

    if !eng.is_highlighted() {
        let label = SharedStr::from(format!("{:.prec$}s", geo.x_to_time(x, window)));
        cmds.push(RenderCommand::DrawText {
            position: Point::new(x, geo.height - geo.line_spacing),
            text: label.clone(),
            color: ThemeToken::CursorLine,
            font_size: FONT_SIZE,
            align: TextAlign::Center,
            baseline: Baseline::Bottom,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(x, geo.line_spacing + geo.text_y0),
            text: label,
            color: ThemeToken::CursorLine,
            font_size: FONT_SIZE,
            align: TextAlign::Center,
            baseline: Baseline::Top,
        });
    }
}

/// Tooltip box near the cursor, clamped to stay on-canvas.
fn render_tooltip(
    eng: &TimelineEngine,
    geo: &PaneGeometry,
    lines: &[String],
    cmds: &mut Vec<RenderCommand>,
) {
    let Some(mouse_y) = eng.mouse.y else {
        return;
    };
    let w = lines
        .iter()
        .map(|l| l.len() as f64 * CHAR_W)
        .fold(1.0, f64::max);
    let h = geo.line_spacing * lines.len() as f64 + 2.0 * TOOLTIP_PAD;

    let mut dy = mouse_y + TOOLTIP_DELTA_Y;
    if dy + h > geo.height {
        dy = geo.height - h;
    }
    let mut dx = eng.mouse.x;
    if geo.right_margin() - dx < w {
        dx -= w + 2.0 * TOOLTIP_PAD;
    }

    cmds.push(RenderCommand::DrawRect {
        rect: Rect::new(dx, dy, w + 2.0 * TOOLTIP_PAD, h),
        fill: Some(ThemeToken::TooltipBackground),
        stroke: None,
        stroke_width: 0.0,
    });
    for (i, line) in lines.iter().enumerate() {
        cmds.push(RenderCommand::DrawText {
            position: Point::new(
                dx + TOOLTIP_PAD,
                dy + TOOLTIP_PAD + i as f64 * geo.line_spacing + geo.line_spacing / 2.0,
            ),
            text: SharedStr::from(line.as_str()),
            color: ThemeToken::TooltipText,
            font_size: FONT_SIZE,
            align: TextAlign::Left,
            baseline: Baseline::Middle,
        });
    }
}

/// Label characters that fit left of the timeline, shortened when the
/// histogram column is shown.
fn title_char_limit(eng: &TimelineEngine, geo: &PaneGeometry) -> usize {
    let left_edge = if eng.show_distribution {
        geo.hist_x + geo.hist_w / 2.0 + 40.0
    } else {
        geo.scroll_bar_width + 60.0
    };
    (((geo.left_margin - left_edge) / CHAR_W) as usize).max(8)
}

fn wrap_chars(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(limit.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use busvis_protocol::SharedStr;
    use crate::group::{GroupBy, MessageField};
    use crate::model::{MessageKind, MessageRecord, PaneRecords};
    use crate::timeline::{PaneGeometry, PaneKind};
    use serde_json::json;

    fn message(serial: u32, sender: &str, t0: f64, t1: Option<f64>) -> MessageRecord {
        MessageRecord {
            kind: MessageKind::MethodCall,
            serial,
            timestamp: t0,
            sender: SharedStr::from(sender),
            destination: SharedStr::from("org.dest"),
            path: SharedStr::from("/obj"),
            interface: SharedStr::from("org.iface"),
            member: SharedStr::from("Do"),
            payload: json!([]),
            end_timestamp: t1,
            outcome: if t1.is_some() { Outcome::Ok } else { Outcome::Pending },
        }
    }

    fn engine(records: Vec<MessageRecord>) -> TimelineEngine {
        let mut eng = TimelineEngine::new(PaneKind::Messages, PaneGeometry::default());
        eng.records = PaneRecords::Messages(records);
        eng.group_by = GroupBy::Messages(vec![MessageField::Sender]);
        eng.regroup(0.0);
        eng.window.set_bounds(0.0, 100.0);
        eng
    }

    fn count_kind(cmds: &[RenderCommand], f: impl Fn(&RenderCommand) -> bool) -> usize {
        cmds.iter().filter(|c| f(c)).count()
    }

    /// Sum a stat over data rows only; headers re-count their children.
    fn data_row_sum<T: std::iter::Sum>(
        eng: &TimelineEngine,
        f: impl Fn(&RowStats) -> T,
    ) -> T {
        eng.row_stats
            .iter()
            .filter(|&(&idx, _)| !eng.rows[idx].header)
            .map(|(_, s)| f(s))
            .sum()
    }

    #[test]
    fn empty_pane_renders_only_furniture() {
        let mut eng = TimelineEngine::new(PaneKind::Messages, PaneGeometry::default());
        let cmds = render(&mut eng);
        // Axis boundaries plus labels, no interval strokes.
        assert!(!cmds.is_empty());
        assert_eq!(
            count_kind(&cmds, |c| matches!(
                c,
                RenderCommand::DrawRect { stroke: Some(ThemeToken::IntervalStroke), .. }
            )),
            0
        );
        assert_eq!(eng.scrollbar, None);
    }

    #[test]
    fn visible_intervals_produce_strokes_and_stats() {
        let mut eng = engine(vec![
            message(1, ":1.1", 10.0, Some(20.0)),
            message(2, ":1.1", 40.0, Some(45.0)),
        ]);
        let cmds = render(&mut eng);
        let strokes = count_kind(&cmds, |c| {
            matches!(
                c,
                RenderCommand::DrawRect { stroke: Some(ThemeToken::IntervalStroke), .. }
            )
        });
        // Far apart on a 100 s window: two separate strokes.
        assert_eq!(strokes, 2);

        assert_eq!(data_row_sum::<u32>(&eng, |s| s.visible), 2);
        let total: f64 = data_row_sum(&eng, |s| s.total_seconds);
        assert!((total - 15.0).abs() < 1e-9);
    }

    #[test]
    fn header_aggregates_children_even_when_expanded() {
        let mut eng = engine(vec![
            message(1, ":1.1", 10.0, Some(20.0)),
            message(2, ":1.2", 40.0, Some(45.0)),
        ]);
        render(&mut eng);
        let header_stats = eng
            .row_stats
            .iter()
            .find(|&(&idx, _)| eng.rows[idx].header)
            .map(|(_, s)| *s)
            .unwrap_or_default();
        assert_eq!(header_stats.visible, 2);
        assert!((header_stats.total_seconds - 15.0).abs() < 1e-9);
    }

    #[test]
    fn subpixel_neighbors_coalesce_into_one_stroke() {
        // 1000 back-to-back 1 ms calls spanning 1 s of a 100 s window:
        // every rectangle lands within a pixel of its neighbor.
        let records: Vec<MessageRecord> = (0u32..1000)
            .map(|i| {
                let t = 10.0 + f64::from(i) * 0.001;
                message(i, ":1.1", t, Some(t + 0.001))
            })
            .collect();
        let mut eng = engine(records);
        let cmds = render(&mut eng);
        let strokes = count_kind(&cmds, |c| {
            matches!(
                c,
                RenderCommand::DrawRect { stroke: Some(ThemeToken::IntervalStroke), .. }
            )
        });
        assert!(strokes < 30, "expected coalescing, got {strokes} strokes");
    }

    #[test]
    fn offscreen_intervals_become_overflow_markers() {
        let mut eng = engine(vec![
            message(1, ":1.1", -50.0, Some(-40.0)),
            message(2, ":1.1", 200.0, Some(210.0)),
            message(3, ":1.1", 250.0, Some(260.0)),
        ]);
        let cmds = render(&mut eng);
        let markers = count_kind(&cmds, |c| {
            matches!(
                c,
                RenderCommand::DrawTriangle {
                    color: ThemeToken::OverflowMarker | ThemeToken::OverflowMarkerActive,
                    ..
                }
            )
        });
        assert_eq!(markers, 2);

        let labels: Vec<String> = cmds
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, .. } if text.starts_with('+') => {
                    Some(text.to_string())
                }
                _ => None,
            })
            .collect();
        assert!(labels.contains(&"+1".to_string()));
        assert!(labels.contains(&"+2".to_string()));
    }

    #[test]
    fn pending_interval_renders_as_circle_not_rect() {
        let mut eng = engine(vec![message(1, ":1.1", 50.0, None)]);
        let cmds = render(&mut eng);
        assert_eq!(
            count_kind(&cmds, |c| matches!(
                c,
                RenderCommand::DrawCircle { color: ThemeToken::PendingFill, .. }
            )),
            1
        );
        assert_eq!(data_row_sum::<u32>(&eng, |s| s.failed), 1);
    }

    #[test]
    fn nan_end_degrades_to_pending_marker() {
        let mut eng = engine(vec![message(1, ":1.1", 50.0, Some(f64::NAN))]);
        // Must not panic, and the malformed record draws as pending.
        let cmds = render(&mut eng);
        assert_eq!(
            count_kind(&cmds, |c| matches!(
                c,
                RenderCommand::DrawCircle { color: ThemeToken::PendingFill, .. }
            )),
            1
        );
    }

    #[test]
    fn selection_scopes_aggregates_and_refreshes_records() {
        let mut eng = engine(vec![
            message(1, ":1.1", 10.0, Some(11.0)),
            message(2, ":1.1", 50.0, Some(51.0)),
        ]);
        eng.highlight = Some((45.0, 55.0));
        eng.highlight_dirty = true;
        render(&mut eng);

        assert_eq!(eng.highlighted_records, vec![1]);
        assert!(!eng.highlight_dirty);
        assert_eq!(data_row_sum::<u32>(&eng, |s| s.visible), 1);
    }

    #[test]
    fn scrollbar_appears_when_rows_overflow() {
        let records: Vec<MessageRecord> = (0u32..200)
            .map(|i| message(i, &format!(":1.{i}"), 1.0, Some(2.0)))
            .collect();
        let mut eng = engine(records);
        render(&mut eng);
        let (y0, y1) = eng.scrollbar.expect("scrollbar extent");
        assert!(y0 >= 0.0 && y1 > y0 && y1 <= eng.geometry.height);
    }

    #[test]
    fn render_is_deterministic_for_unchanged_state() {
        let mut a = engine(vec![
            message(1, ":1.1", 10.0, Some(20.0)),
            message(2, ":1.2", 30.0, Some(35.0)),
        ]);
        let first = render(&mut a);
        let second = render(&mut a);
        assert_eq!(
            serde_json::to_string(&first).ok(),
            serde_json::to_string(&second).ok()
        );
    }

    #[test]
    fn wrap_chars_splits_long_titles() {
        assert_eq!(wrap_chars("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_chars("", 4), vec![String::new()]);
    }
}
