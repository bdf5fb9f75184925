use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use flowshop_core::views::{self, gantt::ROW_HEIGHT};
use flowshop_protocol::{RenderCommand, TextAlign, ThemeToken, Viewport};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Paragraph},
};

use crate::session::LiveSession;

/// Logical units per terminal column.
const CELL_WIDTH: f64 = 8.0;
/// Logical units per terminal row; one machine row per line.
const CELL_HEIGHT: f64 = ROW_HEIGHT;
const ZOOM_STEP: f64 = 1.3;

/// 256-color approximations of the 20-slot job palette.
const JOB_COLORS: [u8; 20] = [
    32, 153, 208, 222, 34, 150, 160, 210, 97, 183, 95, 181, 176, 218, 244, 251, 142, 186, 38, 159,
];

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Job(index) => Color::Indexed(JOB_COLORS[usize::from(index) % JOB_COLORS.len()]),
        ThemeToken::SetupFill | ThemeToken::SetupBorder => Color::LightRed,
        ThemeToken::BarBorder => Color::White,
        ThemeToken::RowBandEven => Color::Rgb(28, 33, 40),
        ThemeToken::RowBandOdd | ThemeToken::Background => Color::Rgb(13, 17, 23),
        ThemeToken::AxisBackground => Color::Rgb(22, 27, 34),
        ThemeToken::AxisTick | ThemeToken::TextMuted | ThemeToken::GridLine => Color::DarkGray,
        ThemeToken::RowLabel | ThemeToken::TextPrimary => Color::White,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct View {
    scroll_x: f64,
    scroll_y: f64,
    zoom: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            zoom: 1.0,
        }
    }
}

impl View {
    fn viewport(&self, area: Rect) -> Viewport {
        Viewport {
            x: self.scroll_x,
            y: self.scroll_y,
            width: f64::from(area.width) * CELL_WIDTH,
            height: f64::from(area.height) * CELL_HEIGHT,
            zoom: self.zoom,
        }
    }

    /// Returns `false` when the key asks to quit.
    fn handle_key(&mut self, code: KeyCode, page_width: f64) -> bool {
        let step = page_width * 0.1;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Left => self.scroll_x = (self.scroll_x - step).max(0.0),
            KeyCode::Right => {
                let max_scroll = page_width * (self.zoom - 1.0);
                self.scroll_x = (self.scroll_x + step).min(max_scroll).max(0.0);
            }
            KeyCode::Up => self.scroll_y = (self.scroll_y - CELL_HEIGHT).max(0.0),
            KeyCode::Down => self.scroll_y += CELL_HEIGHT,
            KeyCode::Char('+' | '=') => self.zoom *= ZOOM_STEP,
            KeyCode::Char('-') => {
                self.zoom = (self.zoom / ZOOM_STEP).max(1.0);
                self.scroll_x = self.scroll_x.min(page_width * (self.zoom - 1.0));
            }
            _ => {}
        }
        true
    }
}

/// Run the interactive view until the user quits.
pub fn run_tui(session: &mut LiveSession) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, session);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: &mut LiveSession,
) -> Result<()> {
    let mut view = View::default();

    loop {
        session.poll();
        let size = terminal.size()?;
        let chart_area = Rect::new(0, 1, size.width, size.height.saturating_sub(2));
        let viewport = view.viewport(chart_area);
        let commands = views::render_chart(&session.state.layout, &viewport);

        terminal.draw(|frame| {
            let area = frame.area();

            let header = Block::default()
                .title(format!(
                    " flowshop-live | frames {} | ←→↑↓ scroll | +/- zoom | s stop | r restart | q quit ",
                    session.state.frames
                ))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, Rect::new(0, 0, area.width, 1));

            let chart = Rect::new(0, 1, area.width, area.height.saturating_sub(2));
            frame.render_widget(
                Block::default().style(Style::default().bg(theme_to_color(ThemeToken::Background))),
                chart,
            );
            if commands.is_empty() {
                frame.render_widget(
                    Paragraph::new(" waiting for the first frame...")
                        .style(Style::default().fg(Color::DarkGray)),
                    chart,
                );
            } else {
                paint(frame.buffer_mut(), chart, &commands);
            }

            let status = Paragraph::new(format!(" {}", session.state.status_line()))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(
                status,
                Rect::new(0, area.height.saturating_sub(1), area.width, 1),
            );
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('s') => session.stop(),
                    KeyCode::Char('r') => {
                        session.restart()?;
                        view = View::default();
                    }
                    code => {
                        if !view.handle_key(code, viewport.width) {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Map render commands onto terminal cells inside `area`.
fn paint(buf: &mut Buffer, area: Rect, commands: &[RenderCommand]) {
    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                label,
                hatched,
                ..
            } => {
                let row = ((rect.y + rect.h / 2.0) / CELL_HEIGHT).floor();
                let first = (rect.x / CELL_WIDTH).floor();
                let last = (rect.right() / CELL_WIDTH).ceil().max(first + 1.0);
                let Some((y, x0, x1)) = clip(area, row, first, last) else {
                    continue;
                };
                let fill = theme_to_color(*color);
                if *hatched {
                    for x in x0..x1 {
                        buf[(x, y)].set_char('░').set_fg(fill);
                    }
                    continue;
                }

                let width = usize::from(x1 - x0);
                let text: Vec<char> = match label {
                    Some(label) if label.chars().count() <= width => {
                        format!("{label:^width$}").chars().collect()
                    }
                    _ => vec![' '; width],
                };
                for (x, ch) in (x0..x1).zip(text) {
                    buf[(x, y)].set_char(ch).set_fg(Color::Black).set_bg(fill);
                }
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                align,
                ..
            } => {
                let len = text.chars().count() as f64;
                let col = (position.x / CELL_WIDTH).floor();
                let first = match align {
                    TextAlign::Left => col,
                    TextAlign::Center => col - (len / 2.0).floor(),
                    TextAlign::Right => col - len,
                };
                let row = (position.y / CELL_HEIGHT).floor();
                let Some((y, x0, x1)) = clip(area, row, first, first + len) else {
                    continue;
                };
                let skip = (f64::from(x0 - area.x) - first).max(0.0) as usize;
                for (x, ch) in (x0..x1).zip(text.chars().skip(skip)) {
                    buf[(x, y)].set_char(ch).set_fg(theme_to_color(*color));
                }
            }
            RenderCommand::DrawLine { .. }
            | RenderCommand::BeginGroup { .. }
            | RenderCommand::EndGroup => {}
        }
    }
}

/// Clip a cell span to `area`, returning buffer coordinates.
fn clip(area: Rect, row: f64, first: f64, last: f64) -> Option<(u16, u16, u16)> {
    if row < 0.0 || row >= f64::from(area.height) {
        return None;
    }
    let first = first.max(0.0);
    let last = last.min(f64::from(area.width));
    if first >= last {
        return None;
    }
    Some((
        area.y + row as u16,
        area.x + first as u16,
        area.x + last as u16,
    ))
}
