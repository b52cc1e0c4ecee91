// src/report.rs

//! Write-once report files.

use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};
use strum::Display;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReportKind {
    Audit,
    Map,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to overwrite existing report {0}")]
    AlreadyExists(PathBuf),
    #[error("pdf conversion failed: {0}")]
    Pdf(String),
}

/// `https://a.com:8080/x/y` → `a.com-8080_x_y`.
pub fn sanitize_target(url: &str) -> String {
    let stripped = url.trim_start_matches("https://").trim_start_matches("http://");
    stripped
        .trim_end_matches('/')
        .chars()
        .map(|c| match c {
            '/' => '_',
            ':' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => c,
            _ => '_',
        })
        .collect()
}

pub fn report_file_name(kind: ReportKind, url: &str, at: DateTime<Local>) -> String {
    format!("{kind}_{}_{}.md", sanitize_target(url), at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Saves `content` under `dir` with a timestamped name.
pub fn save_report(dir: &Path, url: &str, content: &str, kind: ReportKind) -> Result<PathBuf, ReportError> {
    save_report_at(dir, url, content, kind, Local::now())
}

/// Writes to a temporary file in `dir`, then moves it into place. An existing
/// file with the same name is never replaced.
pub fn save_report_at(
    dir: &Path,
    url: &str,
    content: &str,
    kind: ReportKind,
    at: DateTime<Local>,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(kind, url, at));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(&path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ReportError::AlreadyExists(path.clone())
        } else {
            ReportError::Io(e.error)
        }
    })?;

    info!(path = %path.display(), bytes = content.len(), "Report saved.");
    Ok(path)
}

/// Converts a saved markdown report to PDF next to it with `pandoc`.
pub async fn export_pdf(markdown: &Path) -> Result<PathBuf, ReportError> {
    let pdf = markdown.with_extension("pdf");
    let output = Command::new("pandoc")
        .arg(markdown)
        .arg("-o")
        .arg(&pdf)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ReportError::Pdf(format!("could not run pandoc: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(status = %output.status, stderr = %stderr, "pandoc failed.");
        return Err(ReportError::Pdf(stderr));
    }
    info!(path = %pdf.display(), "PDF exported.");
    Ok(pdf)
}
