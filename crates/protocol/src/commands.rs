use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;
use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// The core emits a `Vec<RenderCommand>` per pane per frame. Renderers
/// consume the list sequentially — each command carries all the data it
/// needs, so the same stream can drive any raster backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Filled and/or stroked rectangle.
    DrawRect {
        rect: Rect,
        fill: Option<ThemeToken>,
        stroke: Option<ThemeToken>,
        stroke_width: f64,
    },

    /// Text at a position.
    DrawText {
        position: Point,
        text: SharedStr,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
        baseline: Baseline,
    },

    /// Line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Filled triangle (overflow markers, collapse chevrons).
    DrawTriangle {
        points: [Point; 3],
        color: ThemeToken,
    },

    /// Filled circle (pending-request dots, histogram bucket marks).
    DrawCircle {
        center: Point,
        radius: f64,
        color: ThemeToken,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Vertical anchor for text, mirroring canvas text baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Baseline {
    Top,
    Middle,
    Bottom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_roundtrip_through_json() {
        let cmds = vec![
            RenderCommand::DrawRect {
                rect: Rect::new(0.0, 0.0, 10.0, 15.0),
                fill: Some(ThemeToken::ErrorFill),
                stroke: Some(ThemeToken::IntervalStroke),
                stroke_width: 0.5,
            },
            RenderCommand::DrawText {
                position: Point::new(3.0, 22.0),
                text: SharedStr::from("6, 1"),
                color: ThemeToken::RowLabel,
                font_size: 12.0,
                align: TextAlign::Right,
                baseline: Baseline::Middle,
            },
        ];
        let json = serde_json::to_string(&cmds).unwrap();
        let back: Vec<RenderCommand> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert!(matches!(back[0], RenderCommand::DrawRect { .. }));
    }
}
