// src/ui/widgets/log_view.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Renders the session log, newest lines at the bottom.
///
/// Only as many lines as fit are rendered; the timestamp is dimmed so the
/// messages stand out.
pub fn render_log_view(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().title("Activity").borders(Borders::ALL);
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let visible = usize::from(inner_area.height);
    let log = &app.session.log;
    let start = log.len().saturating_sub(visible);

    let lines: Vec<Line> = log[start..]
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled(entry.at.format("%H:%M:%S").to_string(), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::raw(entry.message.clone()),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner_area);
}
