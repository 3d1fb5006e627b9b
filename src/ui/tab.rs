use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::labels::LabelTable;
use crate::types::Category;
use crate::ui::common::*;

/// Field table for the active tab
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let outer = content_block(app.current_tab.label());
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let mut lines = vec![Line::from("")];
    lines.extend(field_lines(app.orchestrator.labels(), app.current_tab));

    let errors = app.last_report.error_count();
    if errors > 0 {
        lines.push(Line::from(""));
        lines.push(separator(inner.width as usize));
        lines.push(Line::from(Span::styled(
            format!("  {} probe error(s) in the last pass, see log for details", errors),
            Style::default().fg(COLOR_WARN),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

pub fn field_lines<'a>(labels: &LabelTable, category: Category) -> Vec<Line<'a>> {
    labels
        .category(category)
        .into_iter()
        .map(|(field, value)| field_line(field.label(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Field;

    #[test]
    fn one_line_per_field_in_category() {
        let mut labels = LabelTable::new();
        labels.set(Field::Hostname, "bench-box");
        let lines = field_lines(&labels, Category::System);
        assert_eq!(lines.len(), labels.category(Category::System).len());
        assert!(lines
            .iter()
            .any(|l| l.spans[1].content == "bench-box"));
    }
}
