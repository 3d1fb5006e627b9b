use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, area: Rect) {
    let [center_y] = Layout::vertical([Constraint::Length(18)])
        .flex(Flex::Center)
        .areas(area);
    let [center] = Layout::horizontal([Constraint::Length(50)])
        .flex(Flex::Center)
        .areas(center_y);

    // Clear the area behind the overlay
    frame.render_widget(Clear, center);

    let block = Block::default()
        .title(" Help: Keybindings ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));

    let lines = vec![
        Line::from(""),
        help_line("1-7", "Switch to tab"),
        help_line("Tab / \u{2192}", "Next tab"),
        help_line("S-Tab / \u{2190}", "Previous tab"),
        help_line("q / Esc", "Quit"),
        help_line("Ctrl+C", "Quit to shell"),
        help_line("?", "Toggle this help"),
        Line::from(""),
        Line::from(Span::styled(
            " Benchmark (Tab 7)",
            Style::default().fg(Color::Yellow),
        )),
        help_line("b", "Start a run"),
        help_line("t", "Toggle slow / fast mode"),
        help_line("+ / -", "More / fewer threads"),
        Line::from(""),
        Line::from(Span::styled(
            "  Press ? or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, center);
}

fn help_line(key: &str, desc: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {:>12}  ", key),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), Style::default().fg(Color::White)),
    ])
}
