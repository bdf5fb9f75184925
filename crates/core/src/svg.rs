//! SVG export: converts `RenderCommand` lists into standalone SVG strings.

use std::fmt::Write as _;

use flowshop_protocol::{RenderCommand, TextAlign, ThemeToken};

/// tab20-style job palette, dark and light variants.
const JOB_PALETTE_DARK: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];
const JOB_PALETTE_LIGHT: [&str; 20] = [
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
    "#8dd3c7", "#bebada", "#fb8072", "#80b1d3",
];

/// Render a list of commands as an SVG document string.
///
/// `width` and `height` define the SVG viewBox dimensions.
/// `dark` selects the color palette.
pub fn render_svg(commands: &[RenderCommand], width: f64, height: f64, dark: bool) -> String {
    let mut svg = String::with_capacity(commands.len() * 160);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif;font-size:10px">"#,
    );
    let _ = write!(
        svg,
        r#"<defs><pattern id="setup-hatch" width="4" height="4" patternUnits="userSpaceOnUse" patternTransform="rotate(45)"><rect width="2" height="4" fill="{}"/></pattern></defs>"#,
        resolve_color(ThemeToken::SetupFill, dark),
    );
    let _ = write!(
        svg,
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        resolve_color(ThemeToken::Background, dark),
    );

    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                label,
                hatched,
                tooltip,
            } => {
                if rect.w <= 0.0 || rect.h <= 0.0 {
                    continue;
                }
                let fill = if *hatched {
                    "url(#setup-hatch)"
                } else {
                    resolve_color(*color, dark)
                };
                let stroke = border_color.map_or(String::new(), |b| {
                    format!(r#" stroke="{}" stroke-width="0.5""#, resolve_color(b, dark))
                });
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{fill}"{stroke}>"#,
                    rect.x, rect.y, rect.w, rect.h,
                );
                if let Some(tooltip) = tooltip {
                    let _ = write!(svg, "<title>{}</title>", escape_xml(tooltip));
                }
                svg.push_str("</rect>");

                if let Some(label) = label {
                    let text_color = contrast_text(*color, dark);
                    let _ = write!(
                        svg,
                        r#"<text x="{}" y="{}" fill="{text_color}" text-anchor="middle" font-weight="bold" style="pointer-events:none">{}</text>"#,
                        rect.x + rect.w / 2.0,
                        rect.y + rect.h * 0.7,
                        escape_xml(label),
                    );
                }
            }
            RenderCommand::DrawLine {
                from,
                to,
                color,
                width: line_width,
            } => {
                let _ = write!(
                    svg,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{line_width}"/>"#,
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    resolve_color(*color, dark),
                );
            }
            RenderCommand::DrawText {
                text,
                position,
                color,
                align,
                ..
            } => {
                let anchor = match align {
                    TextAlign::Left => "start",
                    TextAlign::Center => "middle",
                    TextAlign::Right => "end",
                };
                let _ = write!(
                    svg,
                    r#"<text x="{}" y="{}" fill="{}" text-anchor="{anchor}">{}</text>"#,
                    position.x,
                    position.y,
                    resolve_color(*color, dark),
                    escape_xml(text),
                );
            }
            RenderCommand::BeginGroup { id, .. } => {
                let _ = write!(svg, r#"<g id="{}">"#, escape_xml(id));
            }
            RenderCommand::EndGroup => svg.push_str("</g>"),
        }
    }

    svg.push_str("</svg>");
    svg
}

fn resolve_color(token: ThemeToken, dark: bool) -> &'static str {
    if let ThemeToken::Job(index) = token {
        let palette = if dark { &JOB_PALETTE_DARK } else { &JOB_PALETTE_LIGHT };
        return palette[usize::from(index) % palette.len()];
    }
    if dark {
        match token {
            ThemeToken::SetupFill => "#f85149",
            ThemeToken::SetupBorder => "#aa4444",
            ThemeToken::BarBorder => "#ffffff",
            ThemeToken::RowBandEven => "#1c2128",
            ThemeToken::RowBandOdd | ThemeToken::Background => "#0d1117",
            ThemeToken::AxisBackground => "#161b22",
            ThemeToken::AxisTick | ThemeToken::TextMuted => "#8b949e",
            ThemeToken::GridLine => "#30363d",
            ThemeToken::RowLabel | ThemeToken::TextPrimary => "#e6edf3",
            ThemeToken::Job(_) => "#616161",
        }
    } else {
        match token {
            ThemeToken::SetupFill => "#ff9999",
            ThemeToken::SetupBorder => "#aa4444",
            ThemeToken::BarBorder => "#444444",
            ThemeToken::RowBandEven | ThemeToken::Background => "#ffffff",
            ThemeToken::RowBandOdd => "#fafafa",
            ThemeToken::AxisBackground => "#f6f8fa",
            ThemeToken::AxisTick | ThemeToken::TextMuted => "#666677",
            ThemeToken::GridLine => "#d0d0d0",
            ThemeToken::RowLabel | ThemeToken::TextPrimary => "#1a1a2e",
            ThemeToken::Job(_) => "#999999",
        }
    }
}

/// Black or white, whichever reads better on the token's fill.
fn contrast_text(token: ThemeToken, dark: bool) -> &'static str {
    let hex = resolve_color(token, dark).trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .map_or(0.0, |v| f64::from(v) / 255.0)
    };
    let luminance = 0.299 * channel(0) + 0.587 * channel(2) + 0.114 * channel(4);
    if luminance > 0.5 { "#000000" } else { "#ffffff" }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
