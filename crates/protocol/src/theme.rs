use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
///
/// The core never sees concrete colors; it names the role of each mark and
/// the UI maps roles to RGBA per theme mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,
    Boundary,
    GridLine,

    AxisText,
    RowLabel,
    RowLabelDim,
    RowHover,

    HeaderFill,
    HeaderText,
    MergedStrip,

    IntervalStroke,
    IntervalFast,
    IntervalSlow,
    ErrorFill,
    ErrorStroke,
    PendingFill,
    PendingHover,

    HoverFill,
    HighlightOverlay,
    HighlightText,
    CursorLine,

    OverflowMarker,
    OverflowMarkerActive,

    ScrollBar,
    ScrollBarActive,
    ScrollStripHover,

    HistogramBackground,
    HistogramFrame,
    HistogramBar,
    HistogramGoodTail,
    HistogramBadTail,
    BucketMarkGood,
    BucketMarkBad,
    BucketMarkNeutral,

    TooltipBackground,
    TooltipText,
}
