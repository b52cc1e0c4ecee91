// src/ui/widgets/header.rs

use crate::app::App;
use crate::core::models::ScanStage;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

/// Target, mode, current stage and elapsed time.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let stage_style = match session.stage {
        ScanStage::Finished => Style::default().fg(Color::Green).bold(),
        ScanStage::Failed => Style::default().fg(Color::Red).bold(),
        _ => Style::default().fg(Color::Yellow).bold(),
    };

    let line = Line::from(vec![
        Span::styled(format!("{} ", app.spinner()), stage_style),
        Span::styled(session.status_message.clone(), stage_style),
        Span::raw("  │  "),
        Span::styled(session.target.clone(), Style::default().fg(Color::Cyan)),
        Span::raw(format!("  │  mode: {}  │  {}", session.mode, app.elapsed())),
    ]);

    let block = Block::default().borders(Borders::ALL).title(" PERFSCAN ".bold());
    frame.render_widget(Paragraph::new(line).block(block), area);
}
