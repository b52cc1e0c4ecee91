// src/ui/mod.rs

//! Status-feed consumers. Both read the latest session snapshot on their own
//! fixed interval, so refresh cadence never depends on how long a stage runs.

use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io::{Stdout, stdout};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::app::App;
use crate::core::models::{ScanSession, ScanStage};

mod layout;
mod widgets;

/// Why the dashboard stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardExit {
    /// The run reached `FINISHED` or `FAILED`, or the orchestrator went away.
    Completed,
    /// The operator pressed `q`.
    QuitRequested,
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let layout = layout::create_layout(frame.area());

    widgets::header::render_header(frame, app, layout.header);
    widgets::log_view::render_log_view(frame, app, layout.log_panel);
    widgets::intel::render_intel(frame, app, layout.intel);
    widgets::footer::render_footer(frame, app, layout.footer);
}

/// Full-screen dashboard. Returns when the run ends or the operator quits.
pub async fn run_dashboard(rx: watch::Receiver<ScanSession>, refresh: Duration) -> Result<DashboardExit> {
    stdout().execute(EnterAlternateScreen)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let outcome = dashboard_loop(&mut terminal, rx, refresh).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    outcome
}

async fn dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut rx: watch::Receiver<ScanSession>,
    refresh: Duration,
) -> Result<DashboardExit> {
    let mut app = App::new(rx.borrow_and_update().clone());
    let mut ticker = tokio::time::interval(refresh);

    loop {
        ticker.tick().await;
        let closed = rx.has_changed().is_err();
        app.apply_snapshot(rx.borrow_and_update().clone());
        app.on_tick();
        terminal.draw(|frame| render(&mut app, frame))?;

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
                if key.kind == KeyEventKind::Press
                    && (ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc))
                {
                    app.quit();
                }
            }
        }
        if app.should_quit {
            debug!("Dashboard closed by operator.");
            return Ok(DashboardExit::QuitRequested);
        }
        if app.is_done() || closed {
            return Ok(DashboardExit::Completed);
        }
    }
}

/// Line-oriented consumer for non-interactive terminals: prints each stage
/// change and every new log line.
pub async fn run_plain(mut rx: watch::Receiver<ScanSession>, refresh: Duration) {
    let mut ticker = tokio::time::interval(refresh);
    let mut seen = 0u64;
    let mut last_stage: Option<ScanStage> = None;

    loop {
        ticker.tick().await;
        let closed = rx.has_changed().is_err();
        let session = rx.borrow_and_update().clone();

        if last_stage != Some(session.stage) {
            println!("==> {} ({}%)", session.stage, session.progress);
            last_stage = Some(session.stage);
        }
        for line in session.lines_since(seen) {
            println!("[{}] {}", line.at.format("%H:%M:%S"), line.message);
        }
        seen = session.log_seq;

        if session.stage.is_terminal() || closed {
            break;
        }
    }
}
