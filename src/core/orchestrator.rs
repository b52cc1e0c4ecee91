// src/core/orchestrator.rs

//! The scan state machine.
//!
//! `INIT → FRONTEND_SCAN → DEEP_SCAN → DATA_NORMALIZATION → AI_ANALYSIS → FINISHED`
//! for audits, `INIT → SITE_CRAWL → FINISHED` for crawls. `FAILED` is reached only
//! on an invalid target, a stage task that panics, or cancellation; probe failures
//! and timeouts degrade the result instead.

use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::core::crawler::canonicalize;
use crate::core::error::{ProbeError, ScanError};
use crate::core::models::{CrawlResult, ProbeResult, ScanMode, ScanSession, ScanStage};
use crate::core::narrative::{NarrativeService, build_prompt, failure_narrative};
use crate::core::normalizer::normalize;
use crate::core::scanner::StageProbes;

const SITE_MAP_INTERNAL_LIMIT: usize = 50;
/// Headroom past the crawl deadline for the page in flight and browser shutdown.
const CRAWL_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub frontend_timeout: Duration,
    pub backend_timeout: Duration,
    pub narrative_timeout: Duration,
    pub crawl_timeout: Duration,
    pub max_pages: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            frontend_timeout: Duration::from_secs(config.stages.frontend_secs),
            backend_timeout: Duration::from_secs(config.stages.backend_secs),
            narrative_timeout: Duration::from_secs(config.stages.narrative_secs),
            crawl_timeout: Duration::from_secs(config.stages.crawl_secs),
            max_pages: config.crawl.max_pages,
        }
    }
}

/// Drives one run. Owns the only mutable `ScanSession` and publishes a clone
/// on every change.
pub struct Orchestrator {
    probes: Arc<dyn StageProbes>,
    narrator: Arc<dyn NarrativeService>,
    settings: OrchestratorSettings,
    session: ScanSession,
    tx: watch::Sender<ScanSession>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        probes: Arc<dyn StageProbes>,
        narrator: Arc<dyn NarrativeService>,
        settings: OrchestratorSettings,
    ) -> (Self, watch::Receiver<ScanSession>) {
        let session = ScanSession::new("", ScanMode::default());
        let (tx, rx) = watch::channel(session.clone());
        let orchestrator = Self { probes, narrator, settings, session, tx, cancel: CancellationToken::new() };
        (orchestrator, rx)
    }

    /// Cancelling this token aborts the in-flight stage and fails the run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the pipeline for `mode` and returns the report text (a narrative or a site map).
    pub async fn run(mut self, target: &str, mode: ScanMode) -> Result<String, ScanError> {
        self.session = ScanSession::new(target, mode);
        self.publish();

        let outcome = match normalize_target(target) {
            Ok(url) => {
                self.session.target = url.clone();
                self.session.set_progress(5);
                self.note(format!("Target acquired: {url} ({mode} mode)"));
                match mode {
                    ScanMode::Crawl => self.run_crawl(&url).await,
                    _ => self.run_audit(&url, mode).await,
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(text) => {
                self.enter(ScanStage::Finished, "COMPLETE", 100);
                self.note("Scan finished.");
                Ok(text)
            }
            Err(e) => {
                error!(error = %e, "Scan failed.");
                let progress = self.session.progress;
                self.enter(ScanStage::Failed, "FAILED", progress);
                self.note(format!("Scan failed: {e}"));
                Err(e)
            }
        }
    }

    async fn run_audit(&mut self, url: &str, mode: ScanMode) -> Result<String, ScanError> {
        self.enter(ScanStage::FrontendScan, "FRONTEND SCAN", 10);
        self.note("Running page-speed audit...");
        let probes = self.probes.clone();
        let target = url.to_string();
        let frontend = self
            .run_stage(ScanStage::FrontendScan, self.settings.frontend_timeout, async move {
                probes.frontend(&target).await
            })
            .await?;
        let auditor = self.settle("Frontend audit", frontend);
        self.set_progress(30);

        self.enter(ScanStage::DeepScan, "DEEP SCAN", 40);
        self.note("Inspecting backend, headers and TLS...");
        let probes = self.probes.clone();
        let target = url.to_string();
        let backend = self
            .run_stage(ScanStage::DeepScan, self.settings.backend_timeout, async move {
                probes.backend(&target).await
            })
            .await?;
        let backend = self.settle("Backend check", backend);
        if let Some(report) = &backend {
            self.session.stack = report.stack.technologies.iter().cloned().collect();
            self.session.security_score = Some(report.security.score);
            self.note(format!(
                "Stack: {} | Security score: {}/100",
                if self.session.stack.is_empty() { "unknown".to_string() } else { self.session.stack.join(", ") },
                report.security.score
            ));
        }
        self.set_progress(60);

        self.enter(ScanStage::DataNormalization, "DATA NORMALIZATION", 70);
        let input = normalize(mode, auditor.as_ref(), backend.as_ref());
        self.note(format!("Performance score: {}/100", input.score));

        self.enter(ScanStage::AiAnalysis, "AI ANALYSIS", 80);
        self.note("Generating narrative report...");
        let narrator = self.narrator.clone();
        let prompt = build_prompt(&input);
        let narrative = self
            .run_stage(ScanStage::AiAnalysis, self.settings.narrative_timeout, async move {
                narrator.generate(&prompt).await
            })
            .await?;
        let text = match narrative {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.narrative_failed(ProbeError::NarrativeFailure("empty response".to_string())),
            Err(e) => self.narrative_failed(e),
        };
        self.set_progress(85);
        Ok(text)
    }

    async fn run_crawl(&mut self, url: &str) -> Result<String, ScanError> {
        self.enter(ScanStage::SiteCrawl, "SITE CRAWL", 10);
        let max_pages = self.settings.max_pages;
        self.note(format!("Crawling up to {max_pages} pages..."));
        let probes = self.probes.clone();
        let target = url.to_string();
        let deadline = Instant::now() + self.settings.crawl_timeout;
        let limit = self.settings.crawl_timeout + CRAWL_SHUTDOWN_GRACE;
        let crawl = self
            .run_stage(ScanStage::SiteCrawl, limit, async move {
                probes.site_map(&target, max_pages, deadline).await
            })
            .await?;
        let result = self.settle("Site crawl", crawl).unwrap_or_default();
        let root = canonicalize(url);
        let total = result.scanned_pages.len().max(1);
        for (i, page) in result.scanned_pages.iter().enumerate() {
            let path = page.strip_prefix(root.as_str()).filter(|p| !p.is_empty()).unwrap_or("/");
            self.note(format!("Mapped: {path}"));
            self.set_progress((10 + 80 * (i + 1) / total) as u8);
        }
        self.note(format!(
            "Crawl finished: {} pages, {} internal links, {} external links",
            result.total_scanned,
            result.internal_links.len(),
            result.external_links.len()
        ));
        self.set_progress(90);
        Ok(render_site_map(url, &result))
    }

    /// Runs a stage body on its own task under `limit`, racing cancellation.
    ///
    /// The outer `Result` is the pipeline outcome; the inner one is the probe's.
    async fn run_stage<T, F>(&self, stage: ScanStage, limit: Duration, body: F) -> Result<ProbeResult<T>, ScanError>
    where
        T: Send + 'static,
        F: Future<Output = ProbeResult<T>> + Send + 'static,
    {
        let mut handle = tokio::spawn(async move { tokio::time::timeout(limit, body).await });
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                handle.abort();
                warn!(%stage, "Stage aborted by cancellation.");
                Err(ScanError::Cancelled)
            }
            joined = &mut handle => match joined {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(_elapsed)) => Ok(Err(ProbeError::timeout(&stage.to_string(), limit))),
                Err(e) => Err(ScanError::StageAborted { stage: stage.to_string(), message: e.to_string() }),
            },
        }
    }

    /// Keeps a successful probe result, or logs the classified failure and returns `None`.
    fn settle<T>(&mut self, what: &str, result: ProbeResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(stage = what, error = %e, kind = e.kind(), "Probe failed, continuing with a degraded result.");
                self.note(format!("{what} failed ({}): {e}", e.kind()));
                None
            }
        }
    }

    fn narrative_failed(&mut self, err: ProbeError) -> String {
        warn!(error = %err, kind = err.kind(), "Narrative generation failed.");
        self.note(format!("Narrative generation failed: {err}"));
        failure_narrative(&err)
    }

    fn enter(&mut self, stage: ScanStage, status: &str, progress: u8) {
        info!(%stage, progress, "Entering stage.");
        self.session.enter(stage, status, progress);
        self.publish();
    }

    fn set_progress(&mut self, progress: u8) {
        self.session.set_progress(progress);
        self.publish();
    }

    fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "perfscan::session", "{message}");
        self.session.push_log(message);
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.session.clone());
    }
}

/// Trims the target, prefixes `https://` when no scheme is given, and requires
/// an http(s) URL with a host.
pub fn normalize_target(target: &str) -> Result<String, ScanError> {
    let trimmed = target.trim();
    let invalid = |reason: &str| ScanError::InvalidTarget { target: target.to_string(), reason: reason.to_string() };
    if trimmed.is_empty() {
        return Err(invalid("empty target"));
    }
    let candidate = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https are supported"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(candidate)
}

/// Markdown site map: totals, the first 50 internal links and every external link.
pub fn render_site_map(target: &str, result: &CrawlResult) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# 🗺️ Site Map: {target}\n");
    let _ = writeln!(doc, "**Total pages scanned:** {}\n", result.total_scanned);
    let _ = writeln!(
        doc,
        "## Internal links ({} shown of {})\n",
        result.internal_links.len().min(SITE_MAP_INTERNAL_LIMIT),
        result.internal_links.len()
    );
    for link in result.internal_links.iter().take(SITE_MAP_INTERNAL_LIMIT) {
        let _ = writeln!(doc, "- {link}");
    }
    let _ = writeln!(doc, "\n## External links ({})\n", result.external_links.len());
    for link in &result.external_links {
        let _ = writeln!(doc, "- {link}");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(normalize_target("  example.com ").unwrap(), "https://example.com");
        assert_eq!(normalize_target("http://a.com/x").unwrap(), "http://a.com/x");
    }

    #[test]
    fn unusable_targets_are_rejected() {
        assert!(matches!(normalize_target(""), Err(ScanError::InvalidTarget { .. })));
        assert!(matches!(normalize_target("ftp://a.com"), Err(ScanError::InvalidTarget { .. })));
        assert!(matches!(normalize_target("https://"), Err(ScanError::InvalidTarget { .. })));
    }

    #[test]
    fn site_map_caps_internal_links() {
        let result = CrawlResult {
            scanned_pages: vec!["https://a.com".into()],
            internal_links: (0..60).map(|i| format!("https://a.com/p{i:02}")).collect(),
            external_links: vec!["https://x.org".into()],
            total_scanned: 1,
        };
        let doc = render_site_map("https://a.com", &result);
        assert!(doc.contains("**Total pages scanned:** 1"));
        assert!(doc.contains("(50 shown of 60)"));
        assert!(doc.contains("- https://a.com/p49"));
        assert!(!doc.contains("- https://a.com/p50"));
        assert!(doc.contains("## External links (1)"));
    }
}
