// src/core/crawler/mod.rs

//! Bounded breadth-first crawl of one site's internal link graph.
//!
//! A single browser session is reused for every page and visits are strictly
//! sequential. A page that fails to load is skipped without retry. With a
//! deadline set, the crawl stops at the deadline and keeps what it mapped.

pub mod browser;

use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::core::error::ProbeError;
use crate::core::models::{CrawlResult, ProbeResult};
use self::browser::BrowserSession;

pub struct Crawler<'a, B: BrowserSession + ?Sized> {
    browser: &'a B,
    config: CrawlConfig,
    deadline: Option<Instant>,
}

enum PageLoad {
    Unreachable(ProbeError),
    Rendered(ProbeResult<String>),
}

/// Working state of one `crawl` call.
struct CrawlState {
    domain: String,
    visited: Vec<String>,
    visited_set: HashSet<String>,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    /// Pages whose navigation failed; never queued again.
    failed: HashSet<String>,
    internal: BTreeSet<String>,
    external: BTreeSet<String>,
}

impl CrawlState {
    fn new(seed: &str) -> Self {
        let seed = canonicalize(seed);
        let mut state = Self {
            domain: netloc(&seed).unwrap_or_default(),
            visited: Vec::new(),
            visited_set: HashSet::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            failed: HashSet::new(),
            internal: BTreeSet::new(),
            external: BTreeSet::new(),
        };
        state.queued.insert(seed.clone());
        state.queue.push_back(seed);
        state
    }

    fn next(&mut self) -> Option<String> {
        let url = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some(canonicalize(&url))
    }

    fn mark_visited(&mut self, url: &str) {
        if self.visited_set.insert(url.to_string()) {
            self.visited.push(url.to_string());
        }
    }

    fn mark_failed(&mut self, url: &str) {
        self.failed.insert(url.to_string());
    }

    fn record_link(&mut self, link: String) {
        if is_internal(&link, &self.domain) {
            let known = self.visited_set.contains(&link) || self.failed.contains(&link);
            if !known && self.queued.insert(link.clone()) {
                self.internal.insert(link.clone());
                self.queue.push_back(link);
            }
        } else {
            self.external.insert(link);
        }
    }

    fn into_result(self) -> CrawlResult {
        CrawlResult {
            total_scanned: self.visited.len(),
            scanned_pages: self.visited,
            internal_links: self.internal.into_iter().collect(),
            external_links: self.external.into_iter().collect(),
        }
    }
}

impl<'a, B: BrowserSession + ?Sized> Crawler<'a, B> {
    pub fn new(browser: &'a B, config: CrawlConfig) -> Self {
        Self { browser, config, deadline: None }
    }

    /// Stops the crawl at `deadline`; the page in flight at that moment is dropped.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Crawls from `seed` until the queue drains or `max_pages` pages were visited.
    pub async fn crawl(&self, seed: &str, max_pages: usize) -> CrawlResult {
        let mut state = CrawlState::new(seed);
        info!(seed, domain = %state.domain, max_pages, "Starting site crawl.");

        while state.visited.len() < max_pages {
            let Some(url) = state.next() else { break };
            if state.visited_set.contains(&url) || state.failed.contains(&url) {
                continue;
            }

            let load = match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.load(&url)).await {
                    Ok(load) => load,
                    Err(_) => {
                        warn!(url = %url, visited = state.visited.len(), "Crawl deadline reached, keeping pages mapped so far.");
                        break;
                    }
                },
                None => self.load(&url).await,
            };

            let html = match load {
                PageLoad::Unreachable(e) => {
                    warn!(url = %url, error = %e, kind = e.kind(), "Skipping page that failed to load.");
                    state.mark_failed(&url);
                    continue;
                }
                PageLoad::Rendered(html) => {
                    state.mark_visited(&url);
                    html
                }
            };
            let html = match html {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %url, error = %e, "Could not read rendered page.");
                    continue;
                }
            };
            let links = extract_links(&html, &url);
            debug!(url = %url, links = links.len(), queued = state.queue.len(), "Page visited.");
            for link in links {
                state.record_link(link);
            }
            debug_assert!(state.queue.iter().all(|u| !state.visited_set.contains(u)));
        }

        let result = state.into_result();
        info!(
            total_scanned = result.total_scanned,
            internal = result.internal_links.len(),
            external = result.external_links.len(),
            "Site crawl finished."
        );
        result
    }

    async fn load(&self, url: &str) -> PageLoad {
        if let Err(e) = self.browser.navigate(url, self.config.nav_timeout()).await {
            return PageLoad::Unreachable(e);
        }
        self.scroll(url).await;
        PageLoad::Rendered(self.browser.content().await)
    }

    async fn scroll(&self, url: &str) {
        for round in 0..self.config.scroll_rounds {
            if let Err(e) = self.browser.scroll_to_bottom().await {
                debug!(url, round, error = %e, "Scrolling stopped early.");
                return;
            }
            tokio::time::sleep(self.config.scroll_pause()).await;
        }
    }
}

/// Drops the fragment and one trailing slash.
pub fn canonicalize(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.strip_suffix('/').unwrap_or(without_fragment).to_string()
}

/// `host[:port]` of a URL, as written in its authority.
fn netloc(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Substring scope test: `blog.a.com` and also `nota.com` count as internal to `a.com`.
pub fn is_internal(url: &str, domain: &str) -> bool {
    netloc(url).is_some_and(|n| n.contains(domain))
}

/// Every `a[href]` target of `html`, resolved against `page_url`, canonicalized,
/// limited to http(s).
pub fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            canonicalize(url.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_and_fragment_are_dropped() {
        assert_eq!(canonicalize("http://a.com/"), canonicalize("http://a.com"));
        assert_eq!(canonicalize("https://a.com/docs/#intro"), "https://a.com/docs");
        assert_eq!(canonicalize("https://a.com//"), "https://a.com/");
    }

    #[test]
    fn scope_is_a_substring_match_on_the_host() {
        assert!(is_internal("https://a.com/about", "a.com"));
        assert!(is_internal("https://blog.a.com/post", "a.com"));
        assert!(is_internal("https://nota.com/", "a.com"));
        assert!(!is_internal("https://b.org/a.com", "a.com"));
        assert!(!is_internal("https://a.com:8080/", "a.com:9090"));
    }

    #[test]
    fn links_are_resolved_and_filtered() {
        let html = r##"
            <a href="/about/">About</a>
            <a href="contact#form">Contact</a>
            <a href="#top">Top</a>
            <a href="mailto:hi@a.com">Mail</a>
            <a href="javascript:void(0)">Noop</a>
            <a href="">Empty</a>
            <a href="https://twitter.com/acme">Twitter</a>"##;
        let links = extract_links(html, "https://a.com/company/");
        assert_eq!(
            links,
            vec![
                "https://a.com/about",
                "https://a.com/company/contact",
                "https://a.com/company",
                "https://twitter.com/acme",
            ]
        );
    }

    #[test]
    fn enqueue_skips_visited_and_queued() {
        let mut state = CrawlState::new("https://a.com/");
        let seed = state.next().unwrap();
        state.mark_visited(&seed);

        state.record_link("https://a.com".to_string());
        state.record_link("https://a.com/x".to_string());
        state.record_link("https://a.com/x".to_string());
        state.record_link("https://other.org".to_string());

        assert_eq!(state.queue, VecDeque::from(vec!["https://a.com/x".to_string()]));
        assert_eq!(state.internal.len(), 1);
        assert_eq!(state.external.len(), 1);
    }

    #[test]
    fn failed_pages_are_not_queued_again() {
        let mut state = CrawlState::new("https://a.com");
        let seed = state.next().unwrap();
        state.mark_visited(&seed);
        state.record_link("https://a.com/broken".to_string());
        let broken = state.next().unwrap();
        state.mark_failed(&broken);

        state.record_link("https://a.com/broken".to_string());
        assert!(state.queue.is_empty());
        assert_eq!(state.internal.len(), 1);
    }
}
