use flowshop_protocol::{Point, Rect, RenderCommand, TextAlign, ThemeToken, Viewport};

use super::{LABEL_GUTTER, TimeScale};
use crate::layout::{Bar, LayoutModel, MachineRow, RowBand};

/// Height of one machine row.
pub const ROW_HEIGHT: f64 = 24.0;
/// Vertical offset of the first row (room for the time axis).
pub const ROWS_TOP: f64 = super::time_axis::AXIS_HEIGHT;
const BAR_INSET: f64 = 3.0;
const SETUP_INSET: f64 = 7.0;
const FONT_SIZE: f64 = 10.0;

/// Render the machine rows of a layout: banded backgrounds, machine labels,
/// setup overlays and job bars.
pub fn render_gantt(model: &LayoutModel, viewport: &Viewport, scale: &TimeScale) -> Vec<RenderCommand> {
    if model.is_empty() {
        return Vec::new();
    }

    let mut commands = Vec::with_capacity(model.bar_count() * 3 + model.rows.len() * 4 + 2);
    commands.push(RenderCommand::BeginGroup {
        id: "gantt".into(),
        label: model.iteration.map(|it| format!("Iteration {it}")),
    });

    for (index, row) in model.rows.iter().enumerate() {
        let y = ROWS_TOP + index as f64 * ROW_HEIGHT - viewport.y;
        if y + ROW_HEIGHT < 0.0 || y > viewport.height {
            continue;
        }
        render_row(&mut commands, row, y, viewport, scale);
    }

    commands.push(RenderCommand::EndGroup);
    commands
}

fn render_row(
    commands: &mut Vec<RenderCommand>,
    row: &MachineRow,
    y: f64,
    viewport: &Viewport,
    scale: &TimeScale,
) {
    let label = format!("M{}", row.machine);
    commands.push(RenderCommand::BeginGroup {
        id: format!("machine-{}", row.machine),
        label: Some(label.clone()),
    });

    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, y, viewport.width, ROW_HEIGHT),
        color: match row.band {
            RowBand::Even => ThemeToken::RowBandEven,
            RowBand::Odd => ThemeToken::RowBandOdd,
        },
        border_color: None,
        label: None,
        hatched: false,
        tooltip: None,
    });

    for bar in &row.bars {
        let x0 = scale.x(bar.start);
        let x1 = scale.x(bar.end);
        let left = bar.setup_start.map_or(x0, |s| scale.x(s));
        if x1 < LABEL_GUTTER || left > viewport.width {
            continue;
        }

        if let Some(setup_start) = bar.setup_start {
            let sx = scale.x(setup_start);
            commands.push(RenderCommand::DrawRect {
                rect: Rect::new(sx, y + SETUP_INSET, x0 - sx, ROW_HEIGHT - 2.0 * SETUP_INSET),
                color: ThemeToken::SetupFill,
                border_color: Some(ThemeToken::SetupBorder),
                label: None,
                hatched: true,
                tooltip: Some(format!("Setup: {}", bar.setup)),
            });
        }

        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(x0, y + BAR_INSET, x1 - x0, ROW_HEIGHT - 2.0 * BAR_INSET),
            color: ThemeToken::job(bar.color),
            border_color: Some(ThemeToken::BarBorder),
            label: bar.show_label.then(|| format!("J{}", bar.job)),
            hatched: false,
            tooltip: Some(tooltip(row.machine, bar)),
        });
    }

    // Drawn last so bars scrolled under the gutter stay hidden behind it.
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, y, LABEL_GUTTER, ROW_HEIGHT),
        color: ThemeToken::Background,
        border_color: None,
        label: None,
        hatched: false,
        tooltip: None,
    });
    commands.push(RenderCommand::DrawText {
        position: Point::new(4.0, y + ROW_HEIGHT / 2.0 + FONT_SIZE / 2.0 - 1.0),
        text: label,
        color: ThemeToken::RowLabel,
        font_size: FONT_SIZE,
        align: TextAlign::Left,
    });

    commands.push(RenderCommand::EndGroup);
}

fn tooltip(machine: u32, bar: &Bar) -> String {
    let previous = bar
        .previous_job
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    format!(
        "Job: {}\nMachine: {machine}\nStart: {}\nEnd: {}\nSetup: {} (after {previous})",
        bar.job, bar.start, bar.end, bar.setup
    )
}
