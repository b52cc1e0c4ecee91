// src/ui/widgets/footer.rs

use crate::app::App;
use crate::core::models::ScanStage;
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::Gauge,
};

/// Progress gauge with the available key hint as its label.
pub fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let progress = app.session.progress;
    let (color, hint) = match app.session.stage {
        ScanStage::Finished => (Color::Green, "done"),
        ScanStage::Failed => (Color::Red, "failed"),
        _ => (Color::Cyan, "Q to abort"),
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .percent(u16::from(progress))
        .label(format!("{progress}% · {hint}"));
    frame.render_widget(gauge, area);
}
