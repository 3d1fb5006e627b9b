pub mod bottom_bar;
pub mod common;
pub mod header_bar;
pub mod help_overlay;
pub mod tab;

use ratatui::layout::{Alignment, Constraint, Flex, Layout, Size};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use common::{COLOR_DIM, COLOR_WARN};

/// Smallest terminal the field tables fit in
pub const MIN_WIDTH: u16 = 80;
pub const MIN_HEIGHT: u16 = 24;

pub fn fits(size: Size) -> bool {
    size.width >= MIN_WIDTH && size.height >= MIN_HEIGHT
}

/// Header, field table of the active tab, tab bar; help on top
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if app.too_small {
        render_too_small(frame, Size::new(area.width, area.height));
        return;
    }

    let [header, table, tabs] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(area);

    header_bar::render(frame, app, header);
    tab::render(frame, app, table);
    bottom_bar::render(frame, app, tabs);

    if app.show_help {
        help_overlay::render(frame, area);
    }
}

fn render_too_small(frame: &mut Frame, size: Size) {
    let [row] = Layout::vertical([Constraint::Length(3)])
        .flex(Flex::Center)
        .areas(frame.area());

    let text = vec![
        Line::from(Span::styled(
            format!("Terminal is {}x{}", size.width, size.height),
            Style::default().fg(COLOR_WARN),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("HX-300 needs at least {MIN_WIDTH}x{MIN_HEIGHT}, or use --dump"),
            Style::default().fg(COLOR_DIM),
        )),
    ];

    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), row);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_size_is_inclusive() {
        assert!(fits(Size::new(MIN_WIDTH, MIN_HEIGHT)));
        assert!(!fits(Size::new(MIN_WIDTH - 1, MIN_HEIGHT)));
        assert!(!fits(Size::new(MIN_WIDTH, MIN_HEIGHT - 1)));
    }
}
