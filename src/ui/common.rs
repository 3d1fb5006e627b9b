use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders};

// -- Color Palette --

pub const COLOR_GOOD: Color = Color::Green;
pub const COLOR_WARN: Color = Color::Yellow;
pub const COLOR_ACCENT: Color = Color::Cyan;
pub const COLOR_DIM: Color = Color::DarkGray;
pub const COLOR_MUTED: Color = Color::Gray;
pub const COLOR_HEADER: Color = Color::Cyan;
pub const COLOR_BORDER: Color = Color::DarkGray;
pub const COLOR_HIGHLIGHT_BG: Color = Color::Rgb(30, 40, 50);

/// Width of the label column in field tables
pub const LABEL_WIDTH: usize = 16;

/// `label  value`, with a dimmed dash for fields not determined yet
pub fn field_line<'a>(label: &str, value: Option<&str>) -> Line<'a> {
    let value_span = match value {
        Some(v) => Span::styled(v.to_string(), Style::default().fg(Color::White)),
        None => Span::styled("-", Style::default().fg(COLOR_DIM)),
    };
    Line::from(vec![
        Span::styled(
            format!("  {:<width$} ", label, width = LABEL_WIDTH),
            Style::default().fg(COLOR_ACCENT),
        ),
        value_span,
    ])
}

/// Rounded outer block for a tab's content
pub fn content_block(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(COLOR_BORDER))
        .title_style(Style::default().fg(COLOR_HEADER).add_modifier(Modifier::BOLD))
}

/// Separator line
pub fn separator(width: usize) -> Line<'static> {
    Line::from(Span::styled(
        format!("  {}", "\u{2500}".repeat(width.saturating_sub(4))),
        Style::default().fg(COLOR_DIM),
    ))
}

/// Get current time as HH:MM:SS (UTC)
pub fn clock_hms() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    hms(secs % 86400)
}

fn hms(secs_of_day: u64) -> String {
    let h = secs_of_day / 3600;
    let m = (secs_of_day % 3600) / 60;
    let s = secs_of_day % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}
