use flowshop_protocol::{Point, Rect, RenderCommand, TextAlign, ThemeToken, Viewport};

use super::{LABEL_GUTTER, TimeScale};

pub const AXIS_HEIGHT: f64 = 24.0;
const MAJOR_TICK_HEIGHT: f64 = 8.0;
const MINOR_TICK_HEIGHT: f64 = 3.0;
const FONT_SIZE: f64 = 10.0;
const MIN_MAJOR_SPACING: f64 = 80.0;

/// Render a time ruler over `[0, max_end]` with vertical gridlines running
/// `grid_height` down through the machine rows.
pub fn render_time_axis(
    viewport: &Viewport,
    scale: &TimeScale,
    max_end: i64,
    grid_height: f64,
) -> Vec<RenderCommand> {
    if max_end <= 0 {
        return Vec::new();
    }

    let mut commands = Vec::with_capacity(48);
    commands.push(RenderCommand::BeginGroup {
        id: "time-axis".into(),
        label: None,
    });
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, 0.0, viewport.width, AXIS_HEIGHT),
        color: ThemeToken::AxisBackground,
        border_color: None,
        label: None,
        hatched: false,
        tooltip: None,
    });

    let (major, minor) = tick_steps(scale.x_scale);
    let mut t = 0;
    while t <= max_end {
        let x = scale.x(t);
        if x > viewport.width {
            break;
        }
        if x >= LABEL_GUTTER {
            if t % major == 0 {
                commands.push(RenderCommand::DrawLine {
                    from: Point::new(x, AXIS_HEIGHT - MAJOR_TICK_HEIGHT),
                    to: Point::new(x, AXIS_HEIGHT),
                    color: ThemeToken::AxisTick,
                    width: 1.0,
                });
                commands.push(RenderCommand::DrawText {
                    position: Point::new(x + 2.0, FONT_SIZE + 2.0),
                    text: t.to_string(),
                    color: ThemeToken::TextMuted,
                    font_size: FONT_SIZE,
                    align: TextAlign::Left,
                });
                if grid_height > 0.0 {
                    commands.push(RenderCommand::DrawLine {
                        from: Point::new(x, AXIS_HEIGHT),
                        to: Point::new(x, AXIS_HEIGHT + grid_height),
                        color: ThemeToken::GridLine,
                        width: 0.5,
                    });
                }
            } else {
                commands.push(RenderCommand::DrawLine {
                    from: Point::new(x, AXIS_HEIGHT - MINOR_TICK_HEIGHT),
                    to: Point::new(x, AXIS_HEIGHT),
                    color: ThemeToken::AxisTick,
                    width: 0.5,
                });
            }
        }
        t += minor;
    }

    commands.push(RenderCommand::EndGroup);
    commands
}

/// Major and minor tick spacing in whole time units: the smallest 1-2-5
/// step that keeps major ticks at least `MIN_MAJOR_SPACING` apart.
fn tick_steps(x_scale: f64) -> (i64, i64) {
    if x_scale <= 0.0 {
        return (1, 1);
    }
    let raw = MIN_MAJOR_SPACING / x_scale;
    let mut magnitude: i64 = 1;
    loop {
        for (multiplier, subdivisions) in [(1, 2), (2, 2), (5, 5)] {
            let step = multiplier * magnitude;
            if step as f64 >= raw {
                return (step, (step / subdivisions).max(1));
            }
        }
        magnitude = match magnitude.checked_mul(10) {
            Some(m) => m,
            None => return (magnitude, magnitude),
        };
    }
}
