use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::types::Category;
use crate::ui::common::*;

/// Marks tabs that are re-read on every tick
const LIVE_MARK: &str = "\u{2022}";

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = tab_spans(app.current_tab);

    let hint = hint_text(app);
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let pad = (area.width as usize).saturating_sub(used + hint.chars().count());
    spans.push(Span::raw(" ".repeat(pad)));
    spans.push(Span::styled(hint, Style::default().fg(COLOR_DIM)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn tab_spans(active: Category) -> Vec<Span<'static>> {
    Category::ALL
        .iter()
        .map(|&category| {
            let mark = if category.is_refreshable() { LIVE_MARK } else { " " };
            let label = format!(" {}{}{} ", category.number(), mark, category.label());
            let style = if category == active {
                Style::default()
                    .fg(COLOR_ACCENT)
                    .bg(COLOR_HIGHLIGHT_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_MUTED)
            };
            Span::styled(label, style)
        })
        .collect()
}

/// Benchmark keys on the Bench tab, the help key elsewhere
fn hint_text(app: &App) -> String {
    if app.current_tab != Category::Bench {
        return " ? Help ".to_string();
    }
    if app.bench.status().running {
        " running... ? Help ".to_string()
    } else {
        " b start  t mode  +/- threads ".to_string()
    }
}
