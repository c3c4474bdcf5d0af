use std::collections::HashMap;

use busvis_protocol::{RenderCommand, SharedStr};
use tracing::debug;

use crate::group::{
    self, GroupBy, HandlerField, HostField, MessageField, group_indices, sender_census,
};
use crate::histogram::{DurationHistogram, HistogramConfig, TailThresholds, compute_histograms};
use crate::interact::{KeyNav, MouseState};
use crate::layout::{assign_stack_levels, merge_spans};
use crate::model::host::describe_key;
use crate::model::{Interval, MergedSpan, Outcome, PaneRecords};
use crate::viewport::TimeWindow;

/// Which data source a pane displays. Drives tooltip and detail-panel
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneKind {
    Messages,
    AsyncHandlers,
    HostRequests,
}

/// Pixel-space layout of one pane, injected at construction. The canvas
/// size is refreshed per frame; everything else is fixed furniture.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneGeometry {
    pub width: f64,
    pub height: f64,
    /// Left edge of the timeline area; labels and aggregates live left of
    /// this.
    pub left_margin: f64,
    pub line_height: f64,
    pub line_spacing: f64,
    /// Top padding above the first text row.
    pub text_y0: f64,
    pub hist_x: f64,
    pub hist_w: f64,
    pub scroll_bar_width: f64,
}

impl Default for PaneGeometry {
    fn default() -> Self {
        Self {
            width: 1400.0,
            height: 600.0,
            left_margin: 640.0,
            line_height: 15.0,
            line_spacing: 17.0,
            text_y0: 3.0,
            hist_x: 270.0,
            hist_w: 100.0,
            scroll_bar_width: 16.0,
        }
    }
}

impl PaneGeometry {
    pub fn right_margin(&self) -> f64 {
        self.width - 10.0
    }

    /// Center of the first data line.
    pub fn y_begin(&self) -> f64 {
        22.0 + self.line_spacing
    }

    /// Height of the hot strip along the top edge that doubles as a
    /// horizontal scrollbar.
    pub fn top_strip_height(&self) -> f64 {
        self.y_begin() - self.line_height / 2.0
    }

    pub fn bottom_strip_height(&self) -> f64 {
        self.line_height
    }

    pub fn timeline_width(&self) -> f64 {
        self.right_margin() - self.left_margin
    }

    pub fn seconds_per_pixel(&self, window: &TimeWindow) -> f64 {
        window.extent() / self.timeline_width()
    }

    /// Clamped linear map from time to pixel x.
    pub fn time_to_x(&self, t: f64, window: &TimeWindow) -> f64 {
        let x = self.left_margin
            + (t - window.lo) / window.extent() * self.timeline_width();
        x.clamp(self.left_margin, self.right_margin())
    }

    /// Clamped inverse map from pixel x to time.
    pub fn x_to_time(&self, x: f64, window: &TimeWindow) -> f64 {
        let t = (x - self.left_margin) / self.timeline_width() * window.extent() + window.lo;
        t.clamp(window.lo, window.hi)
    }
}

/// One display row: either a classification header or a line of
/// intervals.
#[derive(Debug, Clone)]
pub struct RowEntry {
    pub title: SharedStr,
    pub header: bool,
    /// Indices into the engine's interval rows. Headers collect every
    /// child row (including hidden ones while collapsed); data rows hold
    /// exactly one.
    pub interval_rows: Vec<usize>,
    /// Disjoint spans shown on the header strip while collapsed.
    pub merged: Vec<MergedSpan>,
    /// Known-command annotation, shown dimmed next to the title.
    pub description: Option<&'static str>,
}

/// Per-row aggregates produced by the render pass, scoped to the viewport
/// or to the highlighted selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowStats {
    pub visible: u32,
    pub failed: u32,
    pub total_seconds: f64,
}

/// The timeline engine for one pane: data rows, viewport, interaction
/// state and caches, owned explicitly rather than as module globals.
#[derive(Debug)]
pub struct TimelineEngine {
    pub kind: PaneKind,
    pub records: PaneRecords,
    pub group_by: GroupBy,

    pub rows: Vec<RowEntry>,
    /// Interval rows addressed by `RowEntry::interval_rows`.
    pub intervals: Vec<Vec<Interval>>,
    /// Visual height (stack depth) per display row.
    pub heights: Vec<u32>,
    pub collapsed: HashMap<SharedStr, bool>,

    pub window: TimeWindow,
    /// First visible visual line.
    pub scroll_row: usize,
    /// Drag endpoints of the highlighted region, unordered.
    pub highlight: Option<(f64, f64)>,
    /// Records intersecting the highlight, refreshed on selection change.
    pub highlighted_records: Vec<usize>,

    pub show_distribution: bool,
    pub hist_config: HistogramConfig,
    pub histograms: HashMap<SharedStr, DurationHistogram>,
    pub thresholds: HashMap<SharedStr, TailThresholds>,
    /// Highlighted bucket marks per row title, rebuilt each render while
    /// a selection is active.
    pub hist_highlight: HashMap<SharedStr, std::collections::BTreeSet<usize>>,

    pub geometry: PaneGeometry,
    pub mouse: MouseState,
    pub nav: KeyNav,
    /// Vertical scrollbar extent from the last render, for hit testing.
    pub scrollbar: Option<(f64, f64)>,
    pub row_stats: HashMap<usize, RowStats>,

    pub dirty: bool,
    pub highlight_dirty: bool,
    pub(crate) cached_commands: Vec<RenderCommand>,
}

impl TimelineEngine {
    pub fn new(kind: PaneKind, geometry: PaneGeometry) -> Self {
        let (records, group_by) = match kind {
            PaneKind::Messages => (
                PaneRecords::Messages(Vec::new()),
                GroupBy::Messages(vec![MessageField::Sender]),
            ),
            PaneKind::AsyncHandlers => (
                PaneRecords::AsyncHandlers(Vec::new()),
                GroupBy::Handlers(vec![HandlerField::ShortDescription]),
            ),
            PaneKind::HostRequests => (
                PaneRecords::HostRequests(Vec::new()),
                GroupBy::Host(vec![HostField::NetFn, HostField::Cmd]),
            ),
        };
        Self {
            kind,
            records,
            group_by,
            rows: Vec::new(),
            intervals: Vec::new(),
            heights: Vec::new(),
            collapsed: HashMap::new(),
            window: TimeWindow::default(),
            scroll_row: 0,
            highlight: None,
            highlighted_records: Vec::new(),
            show_distribution: kind == PaneKind::HostRequests,
            hist_config: HistogramConfig::default(),
            histograms: HashMap::new(),
            thresholds: HashMap::new(),
            hist_highlight: HashMap::new(),
            geometry,
            mouse: MouseState::default(),
            nav: KeyNav::default(),
            scrollbar: None,
            row_stats: HashMap::new(),
            dirty: true,
            highlight_dirty: false,
            cached_commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Sum of visual heights over all display rows.
    pub fn total_visual_height(&self) -> usize {
        self.heights.iter().map(|&h| h as usize).sum()
    }

    /// Map a visual line index to `(display row, offset within row)`.
    pub fn visual_to_data_row(&self, visual: usize) -> Option<(usize, usize)> {
        let mut lb = 0usize;
        for (i, &h) in self.heights.iter().enumerate() {
            let ub = lb + h as usize;
            if visual < ub {
                return Some((i, visual - lb));
            }
            lb = ub;
        }
        None
    }

    /// Scroll the row window, clamped to `[0, total_visual_height - 1]`.
    pub fn scroll_rows(&mut self, delta: i64) {
        let tvh = self.total_visual_height();
        if tvh == 0 {
            self.scroll_row = 0;
            return;
        }
        let target = self.scroll_row as i64 + delta;
        self.scroll_row = target.clamp(0, tvh as i64 - 1) as usize;
        self.dirty = true;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlight.is_some()
    }

    /// Highlight bounds ordered low-to-high.
    pub fn highlight_bounds(&self) -> Option<(f64, f64)> {
        self.highlight
            .map(|(a, b)| (a.min(b), a.max(b)))
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
        self.dirty = true;
    }

    /// Drop a zero-width highlight (a click without a drag). Returns
    /// whether it was cleared.
    pub fn clear_highlight_if_empty(&mut self) -> bool {
        if let Some((a, b)) = self.highlight
            && a == b
        {
            self.clear_highlight();
            return true;
        }
        false
    }

    /// Column header describing the grouping selection.
    pub fn column_title(&self) -> String {
        if self.group_by.is_empty() {
            "(All requests)".to_string()
        } else {
            self.group_by.title()
        }
    }

    /// Rebuild rows, layout, merged spans and histogram caches from the
    /// current records and grouping selection. `origin_sec` is the shared
    /// capture origin subtracted from every timestamp.
    pub fn regroup(&mut self, origin_sec: f64) {
        self.rows.clear();
        self.intervals.clear();
        self.heights.clear();

        match (&self.records, &self.group_by) {
            (PaneRecords::Messages(_), GroupBy::Messages(fields)) => {
                let fields = fields.clone();
                self.build_message_rows(origin_sec, &fields);
            }
            (PaneRecords::AsyncHandlers(_), GroupBy::Handlers(fields)) => {
                let fields = fields.clone();
                self.build_handler_rows(origin_sec, &fields);
            }
            (PaneRecords::HostRequests(_), GroupBy::Host(fields)) => {
                let fields = fields.clone();
                self.build_host_rows(origin_sec, &fields);
            }
            _ => {}
        }

        self.rebuild_histograms();
        self.hist_highlight.clear();
        self.scroll_row = self.scroll_row.min(self.total_visual_height().saturating_sub(1));
        self.dirty = true;
        debug!(
            pane = ?self.kind,
            rows = self.rows.len(),
            interval_rows = self.intervals.len(),
            "regrouped"
        );
    }

    fn build_message_rows(&mut self, origin: f64, fields: &[MessageField]) {
        let PaneRecords::Messages(records) = &self.records else {
            return;
        };
        let census = sender_census(records);

        let class_groups = group_indices(records.len(), |i| {
            group::classify_message(&records[i], &census).to_string()
        });

        struct PendingHeader {
            row: usize,
            interval_rows: Vec<usize>,
        }
        let mut headers: Vec<PendingHeader> = Vec::new();

        for (class, idxs) in class_groups {
            let collapsed = *self.collapsed.entry(class.clone()).or_insert(false);

            let mut key_groups = group_indices(idxs.len(), |slot| {
                group::message_key(&records[idxs[slot]], fields)
            });
            key_groups.sort_by(|a, b| a.0.cmp(&b.0));

            let header_row = self.rows.len();
            self.rows.push(RowEntry {
                title: class,
                header: true,
                interval_rows: Vec::new(),
                merged: Vec::new(),
                description: None,
            });
            self.heights.push(1);
            let mut header_interval_rows = Vec::new();

            for (key, slots) in key_groups {
                let mut line: Vec<Interval> = slots
                    .iter()
                    .map(|&slot| {
                        let rec = &records[idxs[slot]];
                        Interval {
                            start: rec.timestamp - origin,
                            end: rec.end_timestamp.map(|t| t - origin),
                            record: idxs[slot],
                            outcome: rec.outcome,
                            stack_level: 0,
                        }
                    })
                    .collect();
                let depth = assign_stack_levels(&mut line);
                let interval_row = self.intervals.len();
                self.intervals.push(line);
                header_interval_rows.push(interval_row);

                if !collapsed {
                    self.rows.push(RowEntry {
                        title: key,
                        header: false,
                        interval_rows: vec![interval_row],
                        merged: Vec::new(),
                        description: None,
                    });
                    self.heights.push(depth);
                }
            }

            headers.push(PendingHeader {
                row: header_row,
                interval_rows: header_interval_rows,
            });
        }

        for pending in headers {
            let child_rows: Vec<&[Interval]> = pending
                .interval_rows
                .iter()
                .map(|&i| self.intervals[i].as_slice())
                .collect();
            let merged = merge_spans(&child_rows);
            self.rows[pending.row].interval_rows = pending.interval_rows;
            self.rows[pending.row].merged = merged;
        }
    }

    fn build_handler_rows(&mut self, origin: f64, fields: &[HandlerField]) {
        let PaneRecords::AsyncHandlers(records) = &self.records else {
            return;
        };
        let mut groups = group_indices(records.len(), |i| group::handler_key(&records[i], fields));
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, idxs) in groups {
            let mut line: Vec<Interval> = idxs
                .iter()
                .map(|&i| {
                    let rec = &records[i];
                    Interval {
                        start: rec.entered.unwrap_or(rec.created) - origin,
                        end: rec.exited.map(|t| t - origin),
                        record: i,
                        outcome: Outcome::Ok,
                        stack_level: 0,
                    }
                })
                .collect();
            let depth = assign_stack_levels(&mut line);
            let interval_row = self.intervals.len();
            self.intervals.push(line);
            self.rows.push(RowEntry {
                title: key,
                header: false,
                interval_rows: vec![interval_row],
                merged: Vec::new(),
                description: None,
            });
            self.heights.push(depth);
        }
    }

    fn build_host_rows(&mut self, origin: f64, fields: &[HostField]) {
        let PaneRecords::HostRequests(records) = &self.records else {
            return;
        };
        let origin_us = origin * 1_000_000.0;

        let groups = group_indices(records.len(), |i| group::host_key(&records[i], fields));
        let mut keys: Vec<SharedStr> = groups.iter().map(|(k, _)| k.clone()).collect();
        group::sort_host_keys(&mut keys, fields);
        let by_key: HashMap<SharedStr, Vec<usize>> = groups.into_iter().collect();

        for key in keys {
            let Some(idxs) = by_key.get(&key) else {
                continue;
            };
            let mut line: Vec<Interval> = idxs
                .iter()
                .map(|&i| {
                    let rec = &records[i];
                    Interval {
                        start: (rec.start_us as f64 - origin_us) / 1_000_000.0,
                        end: Some((rec.end_us as f64 - origin_us) / 1_000_000.0),
                        record: i,
                        outcome: Outcome::Ok,
                        stack_level: 0,
                    }
                })
                .collect();
            let depth = assign_stack_levels(&mut line);
            let interval_row = self.intervals.len();
            self.intervals.push(line);
            self.rows.push(RowEntry {
                title: key.clone(),
                header: false,
                interval_rows: vec![interval_row],
                merged: Vec::new(),
                description: describe_key(&key),
            });
            self.heights.push(depth);
        }
    }

    fn rebuild_histograms(&mut self) {
        let mut groups: Vec<(SharedStr, Vec<f64>)> = Vec::new();
        for row in &self.rows {
            if row.header {
                continue;
            }
            let durations: Vec<f64> = row
                .interval_rows
                .iter()
                .flat_map(|&r| self.intervals[r].iter())
                .filter_map(Interval::duration_us)
                .collect();
            groups.push((row.title.clone(), durations));
        }
        self.histograms = compute_histograms(&groups, &self.hist_config);
        self.thresholds = self
            .histograms
            .iter()
            .map(|(title, hist)| {
                (
                    title.clone(),
                    crate::histogram::tail_thresholds(
                        hist,
                        self.hist_config.left_tail,
                        self.hist_config.right_tail,
                    ),
                )
            })
            .collect();
    }

    /// Advance keyboard-driven continuous pan/zoom by one frame, then the
    /// boundary animation. Returns whether anything moved.
    pub fn apply_frame_nav(&mut self) -> bool {
        let mut moved = false;
        let dx = self.nav.frame_pan();
        if dx != 0.0 {
            let dt = dx * self.window.extent();
            self.window.pan(dt);
            moved = true;
        }
        let dz = self.nav.frame_zoom();
        if dz != 0.0 {
            self.window.zoom(dz, None);
            moved = true;
        }
        if self.window.update_animation() {
            moved = true;
        }
        if moved {
            self.dirty = true;
        }
        moved
    }
}
