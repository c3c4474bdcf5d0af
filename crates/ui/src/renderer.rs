use busvis_protocol::{Baseline, RenderCommand, TextAlign};
use egui::{Align, Align2, CornerRadius, FontId, Pos2, Stroke, StrokeKind};

use crate::theme::{self, ThemeMode};

/// Replay a core-produced command list into an egui `Painter`.
///
/// `offset` is the top-left pixel of the pane; commands carry pane-local
/// coordinates. The painter's clip rect culls whatever falls outside.
pub fn render_commands(
    painter: &egui::Painter,
    commands: &[RenderCommand],
    offset: Pos2,
    mode: ThemeMode,
) {
    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                fill,
                stroke,
                stroke_width,
            } => {
                let r = egui::Rect::from_min_size(
                    Pos2::new(rect.x as f32 + offset.x, rect.y as f32 + offset.y),
                    egui::vec2(rect.w as f32, rect.h as f32),
                );
                if !painter.clip_rect().intersects(r) {
                    continue;
                }
                if let Some(fill) = fill {
                    painter.rect_filled(r, CornerRadius::ZERO, theme::resolve(*fill, mode));
                }
                if let Some(stroke) = stroke {
                    painter.rect_stroke(
                        r,
                        CornerRadius::ZERO,
                        Stroke::new(*stroke_width as f32, theme::resolve(*stroke, mode)),
                        StrokeKind::Middle,
                    );
                }
            }

            RenderCommand::DrawText {
                position,
                text,
                color,
                font_size,
                align,
                baseline,
            } => {
                let size = *font_size as f32;
                if size < 1.0 {
                    continue;
                }
                let h = match align {
                    TextAlign::Left => Align::Min,
                    TextAlign::Center => Align::Center,
                    TextAlign::Right => Align::Max,
                };
                let v = match baseline {
                    Baseline::Top => Align::Min,
                    Baseline::Middle => Align::Center,
                    Baseline::Bottom => Align::Max,
                };
                painter.text(
                    Pos2::new(position.x as f32 + offset.x, position.y as f32 + offset.y),
                    Align2([h, v]),
                    text.as_ref(),
                    FontId::monospace(size),
                    theme::resolve(*color, mode),
                );
            }

            RenderCommand::DrawLine {
                from,
                to,
                color,
                width,
            } => {
                painter.line_segment(
                    [
                        Pos2::new(from.x as f32 + offset.x, from.y as f32 + offset.y),
                        Pos2::new(to.x as f32 + offset.x, to.y as f32 + offset.y),
                    ],
                    Stroke::new(*width as f32, theme::resolve(*color, mode)),
                );
            }

            RenderCommand::DrawTriangle { points, color } => {
                let vertices = points
                    .iter()
                    .map(|p| Pos2::new(p.x as f32 + offset.x, p.y as f32 + offset.y))
                    .collect();
                painter.add(egui::Shape::convex_polygon(
                    vertices,
                    theme::resolve(*color, mode),
                    Stroke::NONE,
                ));
            }

            RenderCommand::DrawCircle {
                center,
                radius,
                color,
            } => {
                painter.circle_filled(
                    Pos2::new(center.x as f32 + offset.x, center.y as f32 + offset.y),
                    *radius as f32,
                    theme::resolve(*color, mode),
                );
            }
        }
    }
}
