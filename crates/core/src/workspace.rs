use busvis_protocol::RenderCommand;
use tracing::info;

use crate::correlate::correlate;
use crate::decode::asio::{HandlerLogOutput, parse_handler_log};
use crate::decode::busjson::{SchemaVariant, TraceDecodeSummary, parse_decoder_output};
use crate::decode::DecodeError;
use crate::group::{GroupBy, annotate_blob_sessions};
use crate::interact::{HoverSide, NavKey, SCROLLBAR_GRAB_SLOP, WHEEL_ZOOM_STEP};
use crate::model::PaneRecords;
use crate::timeline::{PaneGeometry, PaneKind, TimelineEngine};
use crate::viewport::RANGE_INIT;
use crate::views;

/// Pane indices in a default workspace.
pub const PANE_MESSAGES: usize = 0;
pub const PANE_HANDLERS: usize = 1;
pub const PANE_HOST: usize = 2;

/// All panes plus the state they share: the link topology and the capture
/// origin every timestamp is shifted by.
///
/// Every navigation operation takes the originating pane and propagates
/// exactly one hop to its linked panes, so mutually linked panes stay
/// synchronized without ping-ponging.
#[derive(Debug)]
pub struct Workspace {
    pub panes: Vec<TimelineEngine>,
    links: Vec<Vec<usize>>,
    pub origin_sec: Option<f64>,
}

impl Workspace {
    /// The standard three-pane layout, fully cross-linked.
    pub fn new() -> Self {
        let geometry = PaneGeometry::default();
        let panes = vec![
            TimelineEngine::new(PaneKind::Messages, geometry.clone()),
            TimelineEngine::new(PaneKind::AsyncHandlers, geometry.clone()),
            TimelineEngine::new(PaneKind::HostRequests, geometry),
        ];
        let mut ws = Self {
            links: vec![Vec::new(); panes.len()],
            panes,
            origin_sec: None,
        };
        ws.link(PANE_MESSAGES, PANE_HANDLERS);
        ws.link(PANE_MESSAGES, PANE_HOST);
        ws.link(PANE_HANDLERS, PANE_HOST);
        ws
    }

    pub fn link(&mut self, a: usize, b: usize) {
        if !self.links[a].contains(&b) {
            self.links[a].push(b);
        }
        if !self.links[b].contains(&a) {
            self.links[b].push(a);
        }
    }

    pub fn linked(&self, pane: usize) -> &[usize] {
        &self.links[pane]
    }

    fn origin(&self) -> f64 {
        self.origin_sec.unwrap_or(0.0)
    }

    // --- Loading -------------------------------------------------------

    /// Load an async-handler tracking log into the handler pane.
    pub fn load_handler_log(&mut self, data: &[u8]) -> Result<HandlerLogOutput, DecodeError> {
        let out = parse_handler_log(data)?;
        info!(
            records = out.records.len(),
            skipped = out.skipped_lines,
            "loaded handler log"
        );
        self.panes[PANE_HANDLERS].records = PaneRecords::AsyncHandlers(out.records.clone());
        self.recompute_origin();
        self.regroup_all();
        Ok(out)
    }

    /// Load the external decoder's paired outputs: correlate the message
    /// stream, extract host requests, and refill both panes.
    pub fn load_decoded_trace(
        &mut self,
        timing: &str,
        records_ndjson: &str,
        schema: SchemaVariant,
    ) -> Result<TraceDecodeSummary, DecodeError> {
        let (decoded, summary) = parse_decoder_output(timing, records_ndjson, schema)?;
        let mut correlated = correlate(&decoded);
        annotate_blob_sessions(&mut correlated.host_requests);
        info!(
            messages = correlated.messages.len(),
            host_requests = correlated.host_requests.len(),
            pending = correlated.pending,
            collisions = correlated.serial_collisions,
            "loaded decoded trace"
        );
        self.panes[PANE_MESSAGES].records = PaneRecords::Messages(correlated.messages);
        self.panes[PANE_HOST].records = PaneRecords::HostRequests(correlated.host_requests);
        self.recompute_origin();
        self.regroup_all();
        Ok(summary)
    }

    /// Shared capture origin: the earliest timestamp across every loaded
    /// dataset.
    fn recompute_origin(&mut self) {
        let mut origin = f64::INFINITY;
        for pane in &self.panes {
            match &pane.records {
                PaneRecords::Messages(records) => {
                    for r in records {
                        origin = origin.min(r.timestamp);
                    }
                }
                PaneRecords::AsyncHandlers(records) => {
                    for r in records {
                        origin = origin.min(r.entered.unwrap_or(r.created));
                    }
                }
                PaneRecords::HostRequests(records) => {
                    for r in records {
                        origin = origin.min(r.start_us as f64 / 1_000_000.0);
                    }
                }
            }
        }
        self.origin_sec = origin.is_finite().then_some(origin);
    }

    pub fn regroup_all(&mut self) {
        let origin = self.origin();
        for pane in &mut self.panes {
            pane.regroup(origin);
        }
    }

    pub fn set_group_by(&mut self, pane: usize, group_by: GroupBy) {
        let origin = self.origin();
        self.panes[pane].group_by = group_by;
        self.panes[pane].regroup(origin);
    }

    pub fn toggle_collapse(&mut self, pane: usize, title: &str) {
        let origin = self.origin();
        let eng = &mut self.panes[pane];
        let entry = eng.collapsed.entry(title.into()).or_insert(false);
        *entry = !*entry;
        eng.regroup(origin);
    }

    // --- Navigation ----------------------------------------------------

    /// Immediate zoom, propagated one hop to linked panes.
    pub fn zoom(&mut self, pane: usize, dz: f64, pivot: Option<f64>) {
        self.panes[pane].window.zoom(dz, pivot);
        self.panes[pane].dirty = true;
        for &other in &self.links[pane].clone() {
            self.panes[other].window.zoom(dz, pivot);
            self.panes[other].dirty = true;
        }
    }

    pub fn begin_zoom_animation(&mut self, pane: usize, dz: f64, pivot: Option<f64>) {
        self.panes[pane].window.begin_zoom(dz, pivot);
        self.panes[pane].dirty = true;
        for &other in &self.links[pane].clone() {
            self.panes[other].window.begin_zoom(dz, pivot);
            self.panes[other].dirty = true;
        }
    }

    pub fn begin_pan_animation(&mut self, pane: usize, screens: f64) {
        self.panes[pane].window.begin_pan_screens(screens);
        self.panes[pane].dirty = true;
        for &other in &self.links[pane].clone() {
            self.panes[other].window.begin_pan_screens(screens);
            self.panes[other].dirty = true;
        }
    }

    pub fn begin_set_bounds_animation(&mut self, pane: usize, lo: f64, hi: f64) {
        self.panes[pane].window.begin_set_bounds(lo, hi);
        self.panes[pane].dirty = true;
        for &other in &self.links[pane].clone() {
            self.panes[other].window.begin_set_bounds(lo, hi);
            self.panes[other].dirty = true;
        }
    }

    /// Animate every pane back to the initial range.
    pub fn reset_zoom(&mut self) {
        for pane in &mut self.panes {
            pane.window.begin_set_bounds(RANGE_INIT.0, RANGE_INIT.1);
            pane.dirty = true;
        }
    }

    pub fn any_animating(&self) -> bool {
        self.panes.iter().any(|p| p.window.animating)
    }

    // --- Pointer and keyboard ------------------------------------------

    /// Pointer motion over `pane`. The cursor x is mirrored into linked
    /// panes (with no y, so they show the cursor line without row hover),
    /// and active highlight drags extend in every linked pane.
    pub fn on_mouse_move(&mut self, pane: usize, x: f64, y: f64) {
        {
            let eng = &mut self.panes[pane];
            eng.mouse.x = x;
            eng.mouse.y = Some(y);
            if eng.mouse.pressed && eng.mouse.side == Some(HoverSide::Timeline) {
                let t1 = eng.geometry.x_to_time(x, &eng.window);
                if let Some((t0, _)) = eng.highlight {
                    eng.highlight = Some((t0, t1));
                }
            }
            eng.update_hover();
            Self::apply_drag(eng);
        }
        // Strip drags write the new bounds straight into linked panes.
        self.sync_strip_drag(pane);

        for &other in &self.links[pane].clone() {
            let eng = &mut self.panes[other];
            eng.mouse.x = x;
            eng.mouse.y = None;
            if eng.mouse.pressed && eng.mouse.side == Some(HoverSide::Timeline) {
                let t1 = eng.geometry.x_to_time(x, &eng.window);
                if let Some((t0, _)) = eng.highlight {
                    eng.highlight = Some((t0, t1));
                }
            }
            eng.update_hover();
        }
    }

    /// Horizontal strip pan and vertical scrollbar drag, applied while
    /// the pointer is held down.
    fn apply_drag(eng: &mut TimelineEngine) {
        if !eng.mouse.pressed {
            return;
        }
        if eng.mouse.over_horizontal_strip() {
            let width = eng.geometry.timeline_width();
            let sec_per_px = (eng.mouse.drag_begin_hi - eng.mouse.drag_begin_lo) / width;
            let pan_secs = (eng.mouse.x - eng.mouse.drag_begin_x) * sec_per_px;
            eng.window.set_bounds(
                eng.mouse.drag_begin_lo - pan_secs,
                eng.mouse.drag_begin_hi - pan_secs,
            );
            eng.dirty = true;
        }
        if eng.mouse.side == Some(HoverSide::ScrollBar)
            && let (Some(begin_y), Some(y)) = (eng.mouse.drag_begin_y, eng.mouse.y)
        {
            let tvh = eng.total_visual_height();
            if tvh > 0 {
                let diff_rows = (tvh as f64 * (y - begin_y) / eng.geometry.height) as i64;
                let target = eng.mouse.drag_begin_scroll_row as i64 + diff_rows;
                eng.scroll_row = target.clamp(0, tvh as i64 - 1) as usize;
                eng.dirty = true;
            }
        }
    }

    /// Scrollbar drags pan linked panes directly, not through animation.
    fn sync_strip_drag(&mut self, pane: usize) {
        let (lo, hi, dragging) = {
            let eng = &self.panes[pane];
            (
                eng.window.lo,
                eng.window.hi,
                eng.mouse.pressed && eng.mouse.over_horizontal_strip(),
            )
        };
        if dragging {
            for &other in &self.links[pane].clone() {
                self.panes[other].window.set_bounds(lo, hi);
                self.panes[other].dirty = true;
            }
        }
    }

    /// Left button down. Dispatch priority: overflow warp, strip drag,
    /// zoom-to-highlight, new highlight drag, vertical scrollbar,
    /// header collapse.
    pub fn on_mouse_down(&mut self, pane: usize) {
        // Overflow-triangle warp to the nearest off-screen interval.
        let warp = {
            let eng = &self.panes[pane];
            match (eng.mouse.hovered_visible_row, eng.mouse.side) {
                (Some(row), Some(HoverSide::LeftOverflow)) => {
                    self.find_offscreen(pane, row, false)
                }
                (Some(row), Some(HoverSide::RightOverflow)) => {
                    self.find_offscreen(pane, row, true)
                }
                _ => None,
            }
        };
        if let Some((start, end)) = warp {
            self.panes[pane].window.begin_warp_to(start, end);
            self.panes[pane].dirty = true;
            for &other in &self.links[pane].clone() {
                self.panes[other].window.begin_warp_to(start, end);
                self.panes[other].dirty = true;
            }
            return;
        }

        let geo = self.panes[pane].geometry.clone();
        let x = self.panes[pane].mouse.x;
        let y = self.panes[pane].mouse.y;

        if x > geo.left_margin {
            let eng = &mut self.panes[pane];
            let tx = eng.geometry.x_to_time(x, &eng.window);
            if eng.mouse.over_horizontal_strip() {
                eng.mouse.pressed = true;
                eng.mouse.drag_begin_x = x;
                eng.mouse.drag_begin_lo = eng.window.lo;
                eng.mouse.drag_begin_hi = eng.window.hi;
            } else if let Some((t0, t1)) = eng.highlight_bounds()
                && tx >= t0
                && tx <= t1
            {
                // Click inside the highlighted region zooms to it.
                eng.clear_highlight();
                self.begin_set_bounds_animation(pane, t0, t1);
                for &other in &self.links[pane].clone() {
                    self.panes[other].clear_highlight();
                }
            } else {
                eng.mouse.side = Some(HoverSide::Timeline);
                eng.mouse.pressed = true;
                eng.highlight = Some((tx, tx));
                eng.dirty = true;
            }
        } else if x < geo.scroll_bar_width
            && let Some(y) = y
            && let Some((y0, y1)) = self.panes[pane].scrollbar
            && y >= y0 - SCROLLBAR_GRAB_SLOP
            && y <= y1 + SCROLLBAR_GRAB_SLOP
        {
            let eng = &mut self.panes[pane];
            eng.mouse.pressed = true;
            eng.mouse.drag_begin_y = Some(y);
            eng.mouse.drag_begin_scroll_row = eng.scroll_row;
            eng.mouse.side = Some(HoverSide::ScrollBar);
        }

        // A click on a header row in the label area toggles collapse.
        if x < geo.left_margin && self.panes[pane].mouse.side != Some(HoverSide::ScrollBar) {
            let header = {
                let eng = &self.panes[pane];
                eng.mouse.hovered_visible_row.and_then(|visible| {
                    let (row, _) = eng.visual_to_data_row(eng.scroll_row + visible)?;
                    eng.rows[row].header.then(|| eng.rows[row].title.clone())
                })
            };
            if let Some(title) = header {
                self.toggle_collapse(pane, &title);
            }
        }
    }

    /// Nearest interval fully off-screen on the given visible row, to the
    /// left or right of the viewport.
    fn find_offscreen(&self, pane: usize, visible_row: usize, right: bool) -> Option<(f64, f64)> {
        let eng = &self.panes[pane];
        let (row, _) = eng.visual_to_data_row(eng.scroll_row + visible_row)?;
        let intervals = &eng.intervals[*eng.rows[row].interval_rows.first()?];
        if right {
            intervals
                .iter()
                .find(|iv| iv.start >= eng.window.hi)
                .map(|iv| (iv.start, iv.end.unwrap_or(iv.start)))
        } else {
            intervals
                .iter()
                .rev()
                .find(|iv| iv.end.unwrap_or(iv.start) <= eng.window.lo)
                .map(|iv| (iv.start, iv.end.unwrap_or(iv.start)))
        }
    }

    /// Left button up: end drags, drop empty highlights, and mark the
    /// selection dirty so the next render refreshes the highlighted
    /// record report.
    pub fn on_mouse_up(&mut self, pane: usize) {
        self.sync_strip_drag(pane);
        let eng = &mut self.panes[pane];
        eng.mouse.end_scrollbar_drag();
        eng.mouse.pressed = false;
        eng.mouse.side = None;
        eng.clear_highlight_if_empty();
        eng.highlight_dirty = true;
        eng.dirty = true;
    }

    /// Wheel over the horizontal strips zooms around the cursor time;
    /// elsewhere it scrolls rows.
    pub fn on_wheel(&mut self, pane: usize, delta_y: f64) {
        let over_strip = {
            let eng = &self.panes[pane];
            match eng.mouse.y {
                Some(y) => {
                    (y > 0.0 && y < eng.geometry.top_strip_height())
                        || (y > eng.geometry.height - eng.geometry.bottom_strip_height()
                            && y < eng.geometry.height)
                }
                None => false,
            }
        };
        if over_strip {
            let (dz, pivot) = {
                let eng = &self.panes[pane];
                let dz = if delta_y > 0.0 {
                    -WHEEL_ZOOM_STEP
                } else {
                    WHEEL_ZOOM_STEP
                };
                (dz, eng.geometry.x_to_time(eng.mouse.x, &eng.window))
            };
            self.zoom(pane, dz, Some(pivot));
        } else if delta_y > 0.0 {
            self.panes[pane].scroll_rows(1);
        } else if delta_y < 0.0 {
            self.panes[pane].scroll_rows(-1);
        }
    }

    /// Keyboard navigation applies to every pane; the per-frame deltas
    /// are consumed in `render_pane`.
    pub fn key_down(&mut self, key: NavKey) {
        for pane in &mut self.panes {
            pane.key_down(key);
        }
    }

    pub fn key_up(&mut self, key: NavKey) {
        for pane in &mut self.panes {
            pane.key_up(key);
        }
    }

    pub fn set_shift(&mut self, shift: bool) {
        for pane in &mut self.panes {
            pane.nav.shift = shift;
        }
    }

    // --- Rendering -----------------------------------------------------

    /// Produce the frame's render commands for one pane. Keyboard deltas
    /// and animations advance first; the command list is rebuilt only
    /// when the pane is dirty and served from cache otherwise.
    pub fn render_pane(&mut self, pane: usize, width: f64, height: f64) -> Vec<RenderCommand> {
        let eng = &mut self.panes[pane];
        if eng.geometry.width != width || eng.geometry.height != height {
            eng.geometry.width = width;
            eng.geometry.height = height;
            eng.dirty = true;
        }
        eng.apply_frame_nav();
        if eng.dirty {
            eng.cached_commands = views::timeline::render(eng);
            eng.dirty = false;
        }
        eng.cached_commands.clone()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_propagates_one_hop() {
        let mut ws = Workspace::new();
        for pane in &mut ws.panes {
            pane.window.set_bounds(0.0, 100.0);
        }
        ws.zoom(PANE_MESSAGES, 0.5, Some(50.0));
        for pane in &ws.panes {
            assert_eq!(pane.window.lo, 25.0);
            assert_eq!(pane.window.hi, 75.0);
        }
    }

    #[test]
    fn bounds_animation_reaches_linked_panes() {
        let mut ws = Workspace::new();
        ws.begin_set_bounds_animation(PANE_HOST, 10.0, 20.0);
        for pane in &ws.panes {
            assert!(pane.window.animating);
            assert_eq!(pane.window.target_lo, 10.0);
            assert_eq!(pane.window.target_hi, 20.0);
        }
    }

    #[test]
    fn highlight_drag_then_release() {
        let mut ws = Workspace::new();
        let geo = ws.panes[PANE_MESSAGES].geometry.clone();
        let y_body = geo.y_begin() + geo.line_spacing * 3.0;

        ws.on_mouse_move(PANE_MESSAGES, geo.left_margin + 100.0, y_body);
        ws.on_mouse_down(PANE_MESSAGES);
        assert!(ws.panes[PANE_MESSAGES].mouse.pressed);
        assert!(ws.panes[PANE_MESSAGES].highlight.is_some());

        ws.on_mouse_move(PANE_MESSAGES, geo.left_margin + 300.0, y_body);
        let (t0, t1) = ws.panes[PANE_MESSAGES].highlight_bounds().unwrap();
        assert!(t1 > t0);

        ws.on_mouse_up(PANE_MESSAGES);
        assert!(!ws.panes[PANE_MESSAGES].mouse.pressed);
        assert!(ws.panes[PANE_MESSAGES].highlight.is_some());
        assert!(ws.panes[PANE_MESSAGES].highlight_dirty);
    }

    #[test]
    fn zero_width_highlight_clears_on_release() {
        let mut ws = Workspace::new();
        let geo = ws.panes[PANE_MESSAGES].geometry.clone();
        let y_body = geo.y_begin() + geo.line_spacing * 3.0;
        ws.on_mouse_move(PANE_MESSAGES, geo.left_margin + 100.0, y_body);
        ws.on_mouse_down(PANE_MESSAGES);
        ws.on_mouse_up(PANE_MESSAGES);
        assert!(ws.panes[PANE_MESSAGES].highlight.is_none());
    }

    #[test]
    fn click_inside_highlight_zooms_to_it() {
        let mut ws = Workspace::new();
        let geo = ws.panes[PANE_MESSAGES].geometry.clone();
        let eng = &mut ws.panes[PANE_MESSAGES];
        eng.window.set_bounds(0.0, 300.0);
        eng.highlight = Some((100.0, 200.0));
        // Cursor in the middle of the timeline maps to t = 150.
        eng.mouse.x = geo.left_margin + geo.timeline_width() / 2.0;
        eng.mouse.y = Some(geo.y_begin() + geo.line_spacing * 2.0);

        ws.on_mouse_down(PANE_MESSAGES);
        let eng = &ws.panes[PANE_MESSAGES];
        assert!(eng.highlight.is_none());
        assert!(eng.window.animating);
        assert_eq!(eng.window.target_lo, 100.0);
        assert_eq!(eng.window.target_hi, 200.0);
    }

    #[test]
    fn wheel_scrolls_rows_outside_strips() {
        let mut ws = Workspace::new();
        let geo = ws.panes[PANE_MESSAGES].geometry.clone();
        // Give the pane some rows to scroll.
        use crate::model::{MessageKind, MessageRecord, Outcome};
        use busvis_protocol::SharedStr;
        let records: Vec<MessageRecord> = (0..5)
            .map(|i| MessageRecord {
                kind: MessageKind::Signal,
                serial: i,
                timestamp: f64::from(i),
                sender: SharedStr::from(format!(":1.{i}")),
                destination: SharedStr::from("<none>"),
                path: SharedStr::from("/obj"),
                interface: SharedStr::from("org.iface"),
                member: SharedStr::from("M"),
                payload: serde_json::json!([]),
                end_timestamp: Some(f64::from(i)),
                outcome: Outcome::Ok,
            })
            .collect();
        ws.panes[PANE_MESSAGES].records = PaneRecords::Messages(records);
        ws.recompute_origin();
        ws.regroup_all();

        ws.on_mouse_move(
            PANE_MESSAGES,
            geo.left_margin + 50.0,
            geo.y_begin() + geo.line_spacing * 2.0,
        );
        ws.on_wheel(PANE_MESSAGES, 1.0);
        assert_eq!(ws.panes[PANE_MESSAGES].scroll_row, 1);
        ws.on_wheel(PANE_MESSAGES, -1.0);
        assert_eq!(ws.panes[PANE_MESSAGES].scroll_row, 0);
    }

    #[test]
    fn origin_is_earliest_across_datasets() {
        let mut ws = Workspace::new();
        let log = "@asio|5.5|*1|x\n@asio|6.0|>1|x\n@asio|7.0|<1|\n";
        ws.load_handler_log(log.as_bytes()).unwrap();
        assert_eq!(ws.origin_sec, Some(6.0));
    }
}
