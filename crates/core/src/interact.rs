use crate::timeline::TimelineEngine;

/// Hot-zone padding around overflow markers and the scrollbar, in pixels.
pub const ZONE_PAD: f64 = 2.0;

/// Extra grab distance above/below the vertical scrollbar.
pub const SCROLLBAR_GRAB_SLOP: f64 = 4.0;

/// Wheel zoom step over the horizontal scrollbar strips.
pub const WHEEL_ZOOM_STEP: f64 = 0.3;

/// Region of the pane the cursor is over, in priority order for
/// mouse-down dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverSide {
    /// Left overflow-marker zone of a row.
    LeftOverflow,
    /// Right overflow-marker zone of a row.
    RightOverflow,
    /// Horizontal scrollbar strip along the top edge.
    TopScrollStrip,
    /// Horizontal scrollbar strip along the bottom edge.
    BottomScrollStrip,
    /// Vertical scrollbar on the left edge.
    ScrollBar,
    /// Timeline body; dragging here draws a highlight region.
    Timeline,
}

/// Pointer state for one pane. Linked panes receive a mirrored x with no
/// y, so they track the cursor without row hover.
#[derive(Debug, Clone, Default)]
pub struct MouseState {
    pub x: f64,
    pub y: Option<f64>,
    pub hovered: bool,
    pub pressed: bool,
    /// Row under the cursor, as an index into the visible lines.
    pub hovered_visible_row: Option<usize>,
    pub side: Option<HoverSide>,

    /// Vertical scrollbar drag anchor.
    pub drag_begin_y: Option<f64>,
    pub drag_begin_scroll_row: usize,

    /// Horizontal strip drag anchor.
    pub drag_begin_x: f64,
    pub drag_begin_lo: f64,
    pub drag_begin_hi: f64,
}

impl MouseState {
    pub fn is_dragging_scrollbar(&self) -> bool {
        self.drag_begin_y.is_some()
    }

    pub fn end_scrollbar_drag(&mut self) {
        self.drag_begin_y = None;
    }

    pub fn over_horizontal_strip(&self) -> bool {
        matches!(
            self.side,
            Some(HoverSide::TopScrollStrip | HoverSide::BottomScrollStrip)
        )
    }
}

/// Keyboard-driven continuous navigation, applied once per render frame
/// until key-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNav {
    /// Screens per frame; negative pans left.
    pub delta_x: f64,
    /// Zoom per frame; positive zooms in.
    pub delta_zoom: f64,
    pub shift: bool,
}

impl KeyNav {
    pub const PAN_STEP: f64 = 0.004;
    pub const ZOOM_STEP: f64 = 0.01;

    pub fn frame_pan(&self) -> f64 {
        self.delta_x * if self.shift { 5.0 } else { 1.0 }
    }

    pub fn frame_zoom(&self) -> f64 {
        self.delta_zoom * if self.shift { 2.0 } else { 1.0 }
    }
}

/// Navigation keys recognized by the panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    PanLeft,
    PanRight,
    ZoomIn,
    ZoomOut,
}

impl TimelineEngine {
    /// Re-derive hover state from the pointer position. Called on every
    /// pointer move; drag handling lives in the workspace, which owns
    /// cross-pane propagation.
    pub fn update_hover(&mut self) {
        let geo = self.geometry.clone();
        let x = self.mouse.x;
        let Some(y) = self.mouse.y else {
            if !self.mouse.pressed {
                self.mouse.hovered_visible_row = None;
                if self.mouse.side != Some(HoverSide::ScrollBar) {
                    self.mouse.side = None;
                }
            }
            self.dirty = true;
            return;
        };

        self.mouse.hovered = x >= geo.left_margin && x <= geo.right_margin();

        let mut line_index = None;
        if x > 0.0 && x < geo.right_margin() {
            let raw = ((y - geo.y_begin() + geo.text_y0) / geo.line_spacing).floor();
            if raw >= 0.0 {
                line_index = Some(raw as usize);
            }
        }

        if self.mouse.side != Some(HoverSide::ScrollBar) && !self.mouse.pressed {
            self.mouse.hovered_visible_row = line_index;
            self.mouse.side = if line_index.is_some()
                && x >= geo.left_margin + ZONE_PAD
                && x <= geo.left_margin + ZONE_PAD + geo.line_spacing / 2.0
            {
                Some(HoverSide::LeftOverflow)
            } else if line_index.is_some()
                && x >= geo.right_margin() - ZONE_PAD - geo.line_spacing / 2.0
                && x <= geo.right_margin() - ZONE_PAD
            {
                Some(HoverSide::RightOverflow)
            } else if x >= geo.left_margin + ZONE_PAD
                && y > 0.0
                && y <= geo.top_strip_height()
            {
                self.mouse.hovered_visible_row = None;
                Some(HoverSide::TopScrollStrip)
            } else if x >= geo.left_margin + ZONE_PAD
                && y >= geo.height - geo.bottom_strip_height()
                && y <= geo.height
            {
                self.mouse.hovered_visible_row = None;
                Some(HoverSide::BottomScrollStrip)
            } else {
                None
            };
        }

        self.dirty = true;
    }

    /// Leave events clear hover unless a scrollbar drag is in progress;
    /// that drag only cares about the y delta and survives excursions
    /// outside the pane.
    pub fn on_mouse_leave(&mut self) {
        if self.mouse.side == Some(HoverSide::ScrollBar) {
            return;
        }
        self.mouse.hovered = false;
        self.mouse.side = None;
        self.mouse.hovered_visible_row = None;
        self.mouse.x = 0.0;
        self.mouse.y = None;
        self.dirty = true;
    }

    pub fn key_down(&mut self, key: NavKey) {
        match key {
            NavKey::PanLeft => self.nav.delta_x = -KeyNav::PAN_STEP,
            NavKey::PanRight => self.nav.delta_x = KeyNav::PAN_STEP,
            NavKey::ZoomIn => self.nav.delta_zoom = KeyNav::ZOOM_STEP,
            NavKey::ZoomOut => self.nav.delta_zoom = -KeyNav::ZOOM_STEP,
        }
    }

    pub fn key_up(&mut self, key: NavKey) {
        match key {
            NavKey::PanLeft | NavKey::PanRight => self.nav.delta_x = 0.0,
            NavKey::ZoomIn | NavKey::ZoomOut => self.nav.delta_zoom = 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{PaneGeometry, PaneKind};

    fn engine() -> TimelineEngine {
        TimelineEngine::new(PaneKind::Messages, PaneGeometry::default())
    }

    #[test]
    fn hover_sides_resolve_by_zone() {
        let mut eng = engine();
        let geo = eng.geometry.clone();

        // Top strip.
        eng.mouse.x = geo.left_margin + 100.0;
        eng.mouse.y = Some(geo.top_strip_height() / 2.0);
        eng.update_hover();
        assert_eq!(eng.mouse.side, Some(HoverSide::TopScrollStrip));
        assert_eq!(eng.mouse.hovered_visible_row, None);

        // Bottom strip.
        eng.mouse.y = Some(geo.height - 2.0);
        eng.update_hover();
        assert_eq!(eng.mouse.side, Some(HoverSide::BottomScrollStrip));

        // Left overflow zone of the first row.
        eng.mouse.x = geo.left_margin + ZONE_PAD + 1.0;
        eng.mouse.y = Some(geo.y_begin());
        eng.update_hover();
        assert_eq!(eng.mouse.side, Some(HoverSide::LeftOverflow));
        assert_eq!(eng.mouse.hovered_visible_row, Some(0));

        // Body of the timeline.
        eng.mouse.x = geo.left_margin + 200.0;
        eng.update_hover();
        assert_eq!(eng.mouse.side, None);
        assert!(eng.mouse.hovered);
    }

    #[test]
    fn linked_pane_without_y_keeps_no_row_hover() {
        let mut eng = engine();
        eng.mouse.x = 800.0;
        eng.mouse.y = None;
        eng.update_hover();
        assert_eq!(eng.mouse.hovered_visible_row, None);
        assert_eq!(eng.mouse.side, None);
    }

    #[test]
    fn shift_accelerates_keyboard_nav() {
        let mut eng = engine();
        eng.key_down(NavKey::PanRight);
        assert_eq!(eng.nav.frame_pan(), KeyNav::PAN_STEP);
        eng.nav.shift = true;
        assert_eq!(eng.nav.frame_pan(), KeyNav::PAN_STEP * 5.0);

        eng.key_down(NavKey::ZoomIn);
        assert_eq!(eng.nav.frame_zoom(), KeyNav::ZOOM_STEP * 2.0);
        eng.key_up(NavKey::ZoomIn);
        assert_eq!(eng.nav.frame_zoom(), 0.0);
    }

    #[test]
    fn mouse_leave_preserves_scrollbar_drag() {
        let mut eng = engine();
        eng.mouse.side = Some(HoverSide::ScrollBar);
        eng.mouse.drag_begin_y = Some(50.0);
        eng.on_mouse_leave();
        assert_eq!(eng.mouse.side, Some(HoverSide::ScrollBar));
        assert!(eng.mouse.is_dragging_scrollbar());

        eng.mouse.side = Some(HoverSide::Timeline);
        eng.on_mouse_leave();
        assert_eq!(eng.mouse.side, None);
        assert!(!eng.mouse.hovered);
    }
}
