use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::ui::common::*;

const TITLE: &str = " HX-300 Hardware Inventory";

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.bench.status();

    // Benchmark badge
    let (badge_label, badge_bg) = if status.running {
        (format!("Bench {}", status.params.mode.label()), COLOR_WARN)
    } else {
        ("Idle".to_string(), COLOR_GOOD)
    };

    let message = app
        .status_message
        .as_deref()
        .map(|m| format!("  {}", m))
        .unwrap_or_default();

    // Right side: badge + clock
    let right_text = format!(" {} ", badge_label);
    let clock_text = format!("  {}", clock_hms());
    let used = TITLE.len() + message.chars().count() + right_text.len() + clock_text.len();
    let pad_len = (area.width as usize).saturating_sub(used);

    let title_line = Line::from(vec![
        Span::styled(
            TITLE,
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(message, Style::default().fg(COLOR_WARN)),
        Span::raw(" ".repeat(pad_len)),
        Span::styled(
            right_text,
            Style::default()
                .fg(Color::Rgb(20, 20, 20))
                .bg(badge_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(clock_text, Style::default().fg(COLOR_MUTED)),
    ]);

    let separator_line = Line::from(Span::styled(
        "\u{2500}".repeat(area.width as usize),
        Style::default().fg(COLOR_BORDER),
    ));

    let paragraph = Paragraph::new(vec![title_line, separator_line]);
    frame.render_widget(paragraph, area);
}
