pub mod commands;
pub mod theme;
pub mod types;

pub use commands::{RenderCommand, TextAlign};
pub use theme::{PALETTE_SIZE, ThemeToken};
pub use types::{Point, Rect, Viewport};
