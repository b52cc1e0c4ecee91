// src/core/scanner/mod.rs

// Public interface of the `scanner` module: the individual probes plus the
// `StageProbes` seam the orchestrator drives them through.
pub mod backend_probe;
pub mod fingerprint_scanner;
pub mod frontend_probe;
pub mod headers_scanner;
pub mod ssl_scanner;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::core::crawler::Crawler;
use crate::core::crawler::browser::{BrowserSession, ChromiumSession};
use crate::core::error::ProbeError;
use crate::core::models::{AuditorReport, BackendReport, CrawlResult, ProbeResult};
use self::backend_probe::run_backend_check;
use self::frontend_probe::run_frontend_audit;

/// The three I/O-bound things a scan can ask for.
///
/// The orchestrator only sees this trait, so tests can substitute probes that
/// stall, fail or answer instantly.
#[async_trait]
pub trait StageProbes: Send + Sync {
    async fn frontend(&self, url: &str) -> ProbeResult<AuditorReport>;
    async fn backend(&self, url: &str) -> ProbeResult<BackendReport>;
    /// Maps the site; pages still unvisited at `deadline` are left out.
    async fn site_map(&self, url: &str, max_pages: usize, deadline: Instant) -> ProbeResult<CrawlResult>;
}

/// Probes backed by the real auditor process, HTTP client and headless browser.
pub struct LiveProbes {
    config: Arc<ScanConfig>,
    client: reqwest::Client,
}

impl LiveProbes {
    pub fn new(config: Arc<ScanConfig>) -> ProbeResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.backend.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ProbeError::tool("http", e))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl StageProbes for LiveProbes {
    async fn frontend(&self, url: &str) -> ProbeResult<AuditorReport> {
        run_frontend_audit(url, &self.config.auditor).await
    }

    async fn backend(&self, url: &str) -> ProbeResult<BackendReport> {
        let browser = if self.config.backend.render_dom {
            match ChromiumSession::launch(&self.config.crawl).await {
                Ok(browser) => Some(browser),
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "No browser for the deep scan, fingerprinting the raw body.");
                    None
                }
            }
        } else {
            None
        };

        let report = run_backend_check(
            &self.client,
            url,
            Duration::from_secs(self.config.backend.request_timeout_secs),
            Duration::from_secs(self.config.backend.tls_timeout_secs),
            browser.as_ref().map(|b| (b, self.config.crawl.nav_timeout())),
        )
        .await;

        if let Some(browser) = &browser {
            if let Err(e) = browser.close().await {
                warn!(error = %e, kind = e.kind(), "Browser did not shut down cleanly.");
            }
        }
        report
    }

    async fn site_map(&self, url: &str, max_pages: usize, deadline: Instant) -> ProbeResult<CrawlResult> {
        let crawl_config = self.config.crawl.clone();
        let browser = ChromiumSession::launch(&crawl_config).await?;
        info!(url, max_pages, "Browser session ready, starting crawl.");

        let result = Crawler::new(&browser, crawl_config).with_deadline(deadline).crawl(url, max_pages).await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, kind = e.kind(), "Browser did not shut down cleanly.");
        }
        Ok(result)
    }
}
