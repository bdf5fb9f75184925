//! Layout model → render commands.

pub mod gantt;
pub mod time_axis;

use flowshop_protocol::{RenderCommand, Viewport};

use crate::layout::LayoutModel;

/// Width reserved left of the chart for machine labels.
pub const LABEL_GUTTER: f64 = 48.0;
/// Headroom past the last end time, as a fraction of it.
const EXTENT_PADDING: f64 = 0.02;

/// Maps schedule time to horizontal position for one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    /// Logical units per time unit.
    pub x_scale: f64,
    /// Horizontal scroll, in logical units.
    pub scroll: f64,
}

impl TimeScale {
    /// Fit `max_end` (plus padding) into the viewport width at its zoom.
    pub fn fit(max_end: i64, viewport: &Viewport) -> Self {
        let extent = (max_end as f64 * (1.0 + EXTENT_PADDING)).max(1.0);
        let usable = (viewport.width - LABEL_GUTTER).max(1.0);
        Self {
            x_scale: usable * viewport.zoom.max(f64::MIN_POSITIVE) / extent,
            scroll: viewport.x,
        }
    }

    pub fn x(&self, t: i64) -> f64 {
        LABEL_GUTTER + t as f64 * self.x_scale - self.scroll
    }
}

/// Full chart: time axis on top, machine rows below.
pub fn render_chart(model: &LayoutModel, viewport: &Viewport) -> Vec<RenderCommand> {
    if model.is_empty() {
        return Vec::new();
    }
    let scale = TimeScale::fit(model.max_end, viewport);
    let grid_height = model.rows.len() as f64 * gantt::ROW_HEIGHT;

    let mut commands = time_axis::render_time_axis(viewport, &scale, model.max_end, grid_height);
    commands.extend(gantt::render_gantt(model, viewport, &scale));
    commands
}
