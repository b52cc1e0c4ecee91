// src/ui/widgets/intel.rs

use crate::app::App;
use crate::core::models::{ScanMode, ScanStage};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Paragraph},
};

const AUDIT_STAGES: &[(ScanStage, &str)] = &[
    (ScanStage::FrontendScan, "Frontend audit"),
    (ScanStage::DeepScan, "Deep scan"),
    (ScanStage::DataNormalization, "Normalization"),
    (ScanStage::AiAnalysis, "Narrative"),
];
const CRAWL_STAGES: &[(ScanStage, &str)] = &[(ScanStage::SiteCrawl, "Site crawl")];

/// Pipeline checklist, security score and detected stack.
pub fn render_intel(frame: &mut Frame, app: &App, area: Rect) {
    if area.width == 0 {
        return;
    }
    let container = Block::default().borders(Borders::ALL).title("Findings");
    frame.render_widget(container, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(6), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let session = &app.session;

    // --- Pipeline ---
    let stages = if session.mode == ScanMode::Crawl { CRAWL_STAGES } else { AUDIT_STAGES };
    let mut pipeline = vec![Line::from("PIPELINE".bold())];
    for (stage, label) in stages {
        let (icon, style) = if session.stage == *stage {
            (app.spinner().to_string(), Style::default().fg(Color::Yellow))
        } else if session.transitions.contains(stage) {
            ("✓".to_string(), Style::default().fg(Color::Green))
        } else {
            ("·".to_string(), Style::default().fg(Color::DarkGray))
        };
        pipeline.push(Line::from(vec![Span::styled(format!("{icon} "), style), Span::raw(*label)]));
    }
    frame.render_widget(Paragraph::new(pipeline), chunks[0]);

    // --- Security score ---
    let security = match session.security_score {
        Some(score) => {
            let style = match score {
                80..=100 => Style::default().fg(Color::Green),
                50..=79 => Style::default().fg(Color::Yellow),
                _ => Style::default().fg(Color::Red),
            };
            Line::from(vec![Span::raw("Security: "), Span::styled(format!("{score}/100"), style)])
        }
        None => Line::from(Span::styled("Security: pending", Style::default().fg(Color::DarkGray))),
    };
    frame.render_widget(Paragraph::new(vec![Line::from("HEADERS".bold()), security]), chunks[1]);

    // --- Technologies ---
    let mut tech_lines = vec![Line::from("TECHNOLOGIES".bold())];
    if session.stack.is_empty() {
        tech_lines.push(Line::from(Span::styled("Not identified yet.", Style::default().fg(Color::DarkGray))));
    } else {
        for tech in &session.stack {
            tech_lines.push(Line::from(vec![
                Span::raw("- "),
                Span::styled(tech.clone(), Style::default().fg(Color::Cyan)),
            ]));
        }
    }
    frame.render_widget(Paragraph::new(tech_lines), chunks[2]);
}
