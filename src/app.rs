// src/app.rs

use crate::core::models::{ScanSession, ScanStage};
use chrono::Local;

const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Dashboard state: the latest session snapshot plus purely visual state.
pub struct App {
    pub session: ScanSession,
    pub should_quit: bool,
    tick: usize,
}

impl App {
    pub fn new(session: ScanSession) -> Self {
        Self { session, should_quit: false, tick: 0 }
    }

    pub fn apply_snapshot(&mut self, session: ScanSession) {
        self.session = session;
    }

    /// Advances the animation; called once per refresh interval.
    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn spinner(&self) -> char {
        match self.session.stage {
            ScanStage::Finished => '✓',
            ScanStage::Failed => '✗',
            _ => SPINNER[self.tick % SPINNER.len()],
        }
    }

    /// `mm:ss` since the run started.
    pub fn elapsed(&self) -> String {
        let secs = (Local::now() - self.session.started_at).num_seconds().max(0);
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    pub fn is_done(&self) -> bool {
        self.session.stage.is_terminal()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ScanMode;

    #[test]
    fn spinner_cycles_while_running() {
        let mut app = App::new(ScanSession::new("https://a.com", ScanMode::Full));
        let first = app.spinner();
        app.on_tick();
        assert_ne!(app.spinner(), first);
        for _ in 0..SPINNER.len() - 1 {
            app.on_tick();
        }
        assert_eq!(app.spinner(), first);
    }

    #[test]
    fn terminal_stages_show_a_fixed_glyph() {
        let mut session = ScanSession::new("https://a.com", ScanMode::Full);
        session.enter(ScanStage::Failed, "FAILED", 10);
        let app = App::new(session);
        assert_eq!(app.spinner(), '✗');
        assert!(app.is_done());
        assert_eq!(app.elapsed().len(), 5);
    }
}
