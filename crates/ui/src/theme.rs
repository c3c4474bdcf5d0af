use busvis_protocol::ThemeToken;

/// Resolved RGBA color for egui rendering.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ResolvedColor {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color32(self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

pub fn resolve(token: ThemeToken, mode: ThemeMode) -> egui::Color32 {
    match mode {
        ThemeMode::Dark => resolve_dark(token),
        ThemeMode::Light => resolve_light(token),
    }
    .to_color32()
}

fn resolve_dark(token: ThemeToken) -> ResolvedColor {
    // Catppuccin Mocha palette
    use ThemeToken::*;
    match token {
        Background => ResolvedColor::rgb(0x11, 0x11, 0x1b), // Crust
        Boundary => ResolvedColor::rgb(0x6c, 0x70, 0x86),   // Overlay0
        GridLine => ResolvedColor::rgb(0x45, 0x47, 0x5a),   // Surface1

        AxisText => ResolvedColor::rgb(0xcd, 0xd6, 0xf4), // Text
        RowLabel => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
        RowLabelDim => ResolvedColor::rgb(0xa6, 0xad, 0xc8), // Subtext0
        RowHover => ResolvedColor::rgba(0xcd, 0xd6, 0xf4, 25),

        HeaderFill => ResolvedColor::rgba(0xb4, 0xbe, 0xfe, 220), // Lavender
        HeaderText => ResolvedColor::rgb(0x1e, 0x1e, 0x2e),       // Base
        MergedStrip => ResolvedColor::rgba(0xcb, 0xa6, 0xf7, 200), // Mauve

        IntervalStroke => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
        IntervalFast => ResolvedColor::rgb(0xa6, 0xe3, 0xa1), // Green
        IntervalSlow => ResolvedColor::rgb(0xf3, 0x8b, 0xa8), // Red
        ErrorFill => ResolvedColor::rgba(0xf3, 0x8b, 0xa8, 160),
        ErrorStroke => ResolvedColor::rgb(0xf3, 0x8b, 0xa8),
        PendingFill => ResolvedColor::rgba(0xfa, 0xb3, 0x87, 200), // Peach
        PendingHover => ResolvedColor::rgb(0xf9, 0xe2, 0xaf),      // Yellow

        HoverFill => ResolvedColor::rgba(0xf9, 0xe2, 0xaf, 128),
        HighlightOverlay => ResolvedColor::rgba(0x89, 0xb4, 0xfa, 70), // Blue
        HighlightText => ResolvedColor::rgb(0x89, 0xb4, 0xfa),
        CursorLine => ResolvedColor::rgb(0x89, 0xb4, 0xfa),

        OverflowMarker => ResolvedColor::rgba(0xf9, 0xe2, 0xaf, 128),
        OverflowMarkerActive => ResolvedColor::rgb(0x89, 0xb4, 0xfa),

        ScrollBar => ResolvedColor::rgb(0x58, 0x5b, 0x70), // Surface2
        ScrollBarActive => ResolvedColor::rgb(0xf9, 0xe2, 0xaf),
        ScrollStripHover => ResolvedColor::rgba(0xf9, 0xe2, 0xaf, 60),

        HistogramBackground => ResolvedColor::rgb(0x1e, 0x1e, 0x2e), // Base
        HistogramFrame => ResolvedColor::rgb(0x6c, 0x70, 0x86),
        HistogramBar => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
        HistogramGoodTail => ResolvedColor::rgba(0xa6, 0xe3, 0xa1, 30),
        HistogramBadTail => ResolvedColor::rgba(0xf3, 0x8b, 0xa8, 30),
        BucketMarkGood => ResolvedColor::rgba(0xa6, 0xe3, 0xa1, 160),
        BucketMarkBad => ResolvedColor::rgba(0xf3, 0x8b, 0xa8, 160),
        BucketMarkNeutral => ResolvedColor::rgba(0x89, 0xb4, 0xfa, 160),

        TooltipBackground => ResolvedColor::rgba(0x11, 0x11, 0x1b, 220),
        TooltipText => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
    }
}

fn resolve_light(token: ThemeToken) -> ResolvedColor {
    use ThemeToken::*;
    match token {
        Background => ResolvedColor::rgb(255, 255, 255),
        Boundary => ResolvedColor::rgb(0, 0, 0),
        GridLine => ResolvedColor::rgb(192, 192, 192),

        AxisText => ResolvedColor::rgb(0, 0, 0),
        RowLabel => ResolvedColor::rgb(0, 0, 0),
        RowLabelDim => ResolvedColor::rgb(136, 136, 136),
        RowHover => ResolvedColor::rgba(32, 32, 32, 50),

        HeaderFill => ResolvedColor::rgb(192, 192, 255),
        HeaderText => ResolvedColor::rgb(0, 0, 51),
        MergedStrip => ResolvedColor::rgba(160, 120, 255, 200),

        IntervalStroke => ResolvedColor::rgb(0, 0, 0),
        IntervalFast => ResolvedColor::rgb(0, 170, 0),
        IntervalSlow => ResolvedColor::rgb(170, 0, 0),
        ErrorFill => ResolvedColor::rgba(192, 128, 128, 200),
        ErrorStroke => ResolvedColor::rgb(192, 128, 128),
        PendingFill => ResolvedColor::rgba(255, 128, 128, 200),
        PendingHover => ResolvedColor::rgba(192, 192, 0, 200),

        HoverFill => ResolvedColor::rgba(255, 255, 0, 128),
        HighlightOverlay => ResolvedColor::rgba(128, 128, 255, 80),
        HighlightText => ResolvedColor::rgb(0, 0, 255),
        CursorLine => ResolvedColor::rgb(0, 0, 255),

        OverflowMarker => ResolvedColor::rgba(128, 128, 0, 128),
        OverflowMarkerActive => ResolvedColor::rgb(0, 0, 255),

        ScrollBar => ResolvedColor::rgb(100, 100, 100),
        ScrollBarActive => ResolvedColor::rgb(255, 255, 51),
        ScrollStripHover => ResolvedColor::rgba(255, 255, 153, 180),

        HistogramBackground => ResolvedColor::rgb(255, 255, 255),
        HistogramFrame => ResolvedColor::rgb(170, 170, 170),
        HistogramBar => ResolvedColor::rgb(0, 0, 0),
        HistogramGoodTail => ResolvedColor::rgba(0, 255, 0, 26),
        HistogramBadTail => ResolvedColor::rgba(255, 0, 0, 26),
        BucketMarkGood => ResolvedColor::rgba(0, 255, 0, 76),
        BucketMarkBad => ResolvedColor::rgba(255, 0, 0, 76),
        BucketMarkNeutral => ResolvedColor::rgba(0, 0, 255, 76),

        TooltipBackground => ResolvedColor::rgba(0, 0, 0, 128),
        TooltipText => ResolvedColor::rgb(255, 255, 255),
    }
}

/// Dark visuals for egui widget chrome, matched to the dark palette.
pub fn dark_visuals() -> egui::Visuals {
    let mut v = egui::Visuals::dark();
    v.panel_fill = egui::Color32::from_rgb(0x18, 0x18, 0x25);
    v.window_fill = egui::Color32::from_rgb(0x1e, 0x1e, 0x2e);
    v.extreme_bg_color = egui::Color32::from_rgb(0x11, 0x11, 0x1b);
    v.selection.bg_fill = egui::Color32::from_rgba_unmultiplied(0x89, 0xb4, 0xfa, 60);
    v.hyperlink_color = egui::Color32::from_rgb(0x89, 0xb4, 0xfa);
    v.warn_fg_color = egui::Color32::from_rgb(0xf9, 0xe2, 0xaf);
    v.error_fg_color = egui::Color32::from_rgb(0xf3, 0x8b, 0xa8);
    v
}

pub fn light_visuals() -> egui::Visuals {
    let mut v = egui::Visuals::light();
    v.panel_fill = egui::Color32::from_rgb(248, 248, 250);
    v.window_fill = egui::Color32::WHITE;
    v.error_fg_color = egui::Color32::from_rgb(211, 47, 47);
    v
}
