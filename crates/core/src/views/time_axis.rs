use busvis_protocol::{Baseline, Point, RenderCommand, SharedStr, TextAlign, ThemeToken};

use crate::timeline::PaneGeometry;
use crate::viewport::TimeWindow;

/// Grid steps tried coarse-to-fine, in seconds. The first step smaller
/// than the visible extent drives the ladder.
const BREAK_WIDTHS: [f64; 29] = [
    86400.0, 10800.0, 3600.0, 1800.0, 1200.0, 600.0, 300.0, 120.0, //
    60.0, 30.0, 10.0, 5.0, 2.0, 1.0, 0.5, 0.2, //
    0.1, 0.05, 0.02, 0.01, 0.005, 0.002, 0.001, 0.0005, //
    0.0002, 0.0001, 0.00005, 0.00002, 0.00001,
];

/// Cap on gridlines per frame so a degenerate window cannot stall a
/// redraw.
const BREAK_DRAW_LIMIT: usize = 1000;

pub const FONT_SIZE: f64 = 12.0;

/// Approximate glyph advance of the monospace label font, for keeping
/// labels inside the right margin without a text-measure round trip.
pub const CHAR_W: f64 = FONT_SIZE * 0.6;

/// Label decimals widen as the window narrows.
pub fn precision(extent: f64) -> usize {
    if extent < 0.1 {
        4
    } else if extent < 1.0 {
        3
    } else {
        2
    }
}

/// Emit the time axis: pane boundary lines, the visible-range labels at
/// all four corners, and the "nice" break ladder with labels top and
/// bottom.
pub fn render(geo: &PaneGeometry, window: &TimeWindow) -> Vec<RenderCommand> {
    let mut cmds = Vec::new();
    let prec = precision(window.extent());
    let height = geo.height;

    for x in [geo.left_margin, geo.right_margin()] {
        cmds.push(RenderCommand::DrawLine {
            from: Point::new(x, 0.0),
            to: Point::new(x, height),
            color: ThemeToken::Boundary,
            width: 1.0,
        });
    }

    let label_lo = SharedStr::from(format!("{:.prec$}s", window.lo));
    let label_hi = SharedStr::from(format!("{:.prec$}s", window.hi));
    for (baseline, y) in [(Baseline::Top, geo.text_y0), (Baseline::Bottom, height)] {
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.left_margin + 3.0, y),
            text: label_lo.clone(),
            color: ThemeToken::AxisText,
            font_size: FONT_SIZE,
            align: TextAlign::Left,
            baseline,
        });
        cmds.push(RenderCommand::DrawText {
            position: Point::new(geo.right_margin() - 3.0, y),
            text: label_hi.clone(),
            color: ThemeToken::AxisText,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
            baseline,
        });
    }

    let extent = window.extent();
    if !(extent > 0.0) {
        return cmds;
    }
    let mut bidx = 0;
    while bidx < BREAK_WIDTHS.len() && BREAK_WIDTHS[bidx] > extent {
        bidx += 1;
    }
    // One rung finer than the first step fitting the window, so at least
    // a few breaks are visible.
    let Some(&step) = BREAK_WIDTHS.get(bidx + 1) else {
        return cmds;
    };

    let mut t = (window.lo / step).ceil() * step;
    let mut drawn = 0;
    while t < window.hi && drawn < BREAK_DRAW_LIMIT {
        if t > window.lo {
            let x = geo.time_to_x(t, window);
            cmds.push(RenderCommand::DrawLine {
                from: Point::new(x, 0.0),
                to: Point::new(x, height),
                color: ThemeToken::GridLine,
                width: 1.0,
            });

            let label = format!("{t:.prec$}s");
            // Flip the label to the left of the gridline when it would
            // spill past the right margin.
            let align = if x + label.len() as f64 * CHAR_W > geo.right_margin() {
                TextAlign::Right
            } else {
                TextAlign::Left
            };
            let text = SharedStr::from(label);
            cmds.push(RenderCommand::DrawText {
                position: Point::new(x, height),
                text: text.clone(),
                color: ThemeToken::GridLine,
                font_size: FONT_SIZE,
                align,
                baseline: Baseline::Bottom,
            });
            cmds.push(RenderCommand::DrawText {
                position: Point::new(x, geo.text_y0),
                text,
                color: ThemeToken::GridLine,
                font_size: FONT_SIZE,
                align,
                baseline: Baseline::Top,
            });
            drawn += 1;
        }
        t += step;
    }

    cmds
}
