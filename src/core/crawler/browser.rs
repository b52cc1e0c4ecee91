// src/core/crawler/browser.rs

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::CrawlConfig;
use crate::core::error::ProbeError;
use crate::core::models::ProbeResult;

const SCROLL_SCRIPT: &str = "window.scrollBy(0, 15000)";

/// One page-rendering session, reused for every visit of a crawl.
///
/// Visits are strictly sequential, so implementations only need to support
/// one navigation at a time.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Loads `url` and waits for it, failing with `NetworkTimeout` after `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> ProbeResult<()>;
    /// Scrolls once towards the bottom of the current page.
    async fn scroll_to_bottom(&self) -> ProbeResult<()>;
    /// The rendered HTML of the current page.
    async fn content(&self) -> ProbeResult<String>;
    async fn close(&self) -> ProbeResult<()>;
}

/// Headless Chromium driven over CDP.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    pub async fn launch(config: &CrawlConfig) -> ProbeResult<Self> {
        let (width, height) = config.viewport;
        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(|e| ProbeError::tool("chromium", e))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!(error = %e, "Could not launch Chromium.");
            ProbeError::tool("chromium", e)
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error.");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::tool("chromium", e))?;
        page.set_user_agent(config.user_agent.as_str())
            .await
            .map_err(|e| ProbeError::tool("chromium", e))?;

        info!(width, height, "Chromium session launched.");
        Ok(Self { browser: Mutex::new(browser), page, handler })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> ProbeResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::tool("chromium", format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(ProbeError::timeout("navigation", timeout)),
        }
    }

    async fn scroll_to_bottom(&self) -> ProbeResult<()> {
        self.page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::tool("chromium", e))
    }

    async fn content(&self) -> ProbeResult<String> {
        self.page.content().await.map_err(|e| ProbeError::parse("rendered html", e))
    }

    async fn close(&self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(|e| ProbeError::tool("chromium", e));
        self.handler.abort();
        debug!("Chromium session closed.");
        closed
    }
}
