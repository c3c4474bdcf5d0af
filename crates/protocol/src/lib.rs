pub mod commands;
pub mod shared_str;
pub mod theme;
pub mod types;

pub use commands::{Baseline, RenderCommand, TextAlign};
pub use shared_str::SharedStr;
pub use theme::ThemeToken;
pub use types::{Point, Rect};
