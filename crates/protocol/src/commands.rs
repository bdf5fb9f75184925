use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// View transforms in the core emit a `Vec<RenderCommand>` per layout.
/// Render adapters (terminal, SVG) consume the list in order; every command
/// carries all the data it needs, so adapters never reach back into the
/// schedule model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Draw a filled rectangle with an optional centered label.
    ///
    /// `hatched` marks overlays (setup segments) that adapters should draw
    /// with a pattern or reduced height so they read differently from bars.
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        label: Option<String>,
        hatched: bool,
        /// Hover text for adapters that support it.
        tooltip: Option<String>,
    },

    /// Draw a text string at a position.
    DrawText {
        position: Point,
        text: String,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Begin a logical group (a machine row, the time axis).
    BeginGroup { id: String, label: Option<String> },

    /// End the current group.
    EndGroup,
}

impl RenderCommand {
    pub fn is_rect(&self) -> bool {
        matches!(self, Self::DrawRect { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}
