// src/ui/layout.rs

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Areas of the dashboard, computed once per frame.
pub struct AppLayout {
    pub header: Rect,
    pub log_panel: Rect,
    pub intel: Rect,
    pub footer: Rect,
}

/// Header on top, the session log beside the findings panel, progress at the bottom.
/// Narrow terminals drop the findings panel.
pub fn create_layout(frame_size: Rect) -> AppLayout {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(frame_size);

    let show_intel = frame_size.width >= 80;
    let content_constraints = if show_intel {
        vec![Constraint::Percentage(65), Constraint::Percentage(35)]
    } else {
        vec![Constraint::Percentage(100)]
    };
    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(content_constraints)
        .split(main_chunks[1]);

    AppLayout {
        header: main_chunks[0],
        log_panel: content_chunks[0],
        intel: if show_intel { content_chunks[1] } else { Rect::default() },
        footer: main_chunks[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_terminals_hide_the_intel_panel() {
        let layout = create_layout(Rect::new(0, 0, 60, 20));
        assert_eq!(layout.intel, Rect::default());
        assert_eq!(layout.log_panel.width, 60);

        let wide = create_layout(Rect::new(0, 0, 120, 40));
        assert!(wide.intel.width > 0);
        assert_eq!(wide.header.height, 3);
        assert_eq!(wide.footer.height, 1);
    }
}
