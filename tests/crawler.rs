use async_trait::async_trait;
use perfscan::config::CrawlConfig;
use perfscan::core::crawler::Crawler;
use perfscan::core::crawler::browser::BrowserSession;
use perfscan::core::error::ProbeError;
use perfscan::core::models::ProbeResult;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Serves canned HTML per URL; anything else times out.
struct FakeBrowser {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
    current: Mutex<Option<String>>,
    navigations: Mutex<Vec<String>>,
}

impl FakeBrowser {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect(),
            failing: HashSet::new(),
            stalling: HashSet::new(),
            current: Mutex::new(None),
            navigations: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn stalling_on(mut self, url: &str) -> Self {
        self.stalling.insert(url.to_string());
        self
    }

    fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str, timeout: Duration) -> ProbeResult<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        if self.stalling.contains(url) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.contains(url) || !self.pages.contains_key(url) {
            return Err(ProbeError::timeout("navigation", timeout));
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> ProbeResult<()> {
        Ok(())
    }

    async fn content(&self) -> ProbeResult<String> {
        let current = self.current.lock().unwrap().clone();
        current
            .and_then(|url| self.pages.get(&url).cloned())
            .ok_or_else(|| ProbeError::parse("rendered html", "no page loaded"))
    }

    async fn close(&self) -> ProbeResult<()> {
        Ok(())
    }
}

fn fast_config() -> CrawlConfig {
    CrawlConfig { scroll_rounds: 2, scroll_pause_ms: 0, nav_timeout_secs: 1, ..CrawlConfig::default() }
}

/// Five pages, four internal links besides the seed, two external links.
fn small_site() -> FakeBrowser {
    FakeBrowser::new(&[
        (
            "https://a.com",
            r##"<a href="/about">About</a>
                <a href="/blog/">Blog</a>
                <a href="/about#team">Team</a>
                <a href="https://twitter.com/acme">Twitter</a>
                <a href="#top">Top</a>
                <a href="mailto:hi@a.com">Mail</a>"##,
        ),
        (
            "https://a.com/about",
            r#"<a href="/">Home</a>
               <a href="/contact">Contact</a>
               <a href="https://github.com/acme">GitHub</a>"#,
        ),
        ("https://a.com/blog", r#"<a href="/blog/post-1">First post</a><a href="/about/">About</a>"#),
        ("https://a.com/contact", r#"<a href="https://twitter.com/acme">Twitter</a>"#),
        ("https://a.com/blog/post-1", r#"<a href="https://a.com/blog">Back</a>"#),
    ])
}

#[tokio::test]
async fn crawls_the_whole_small_site() {
    let browser = small_site();
    let result = Crawler::new(&browser, fast_config()).crawl("https://a.com/", 30).await;

    assert_eq!(result.total_scanned, 5);
    assert_eq!(
        result.scanned_pages,
        vec![
            "https://a.com",
            "https://a.com/about",
            "https://a.com/blog",
            "https://a.com/contact",
            "https://a.com/blog/post-1",
        ]
    );
    assert_eq!(
        result.internal_links,
        vec!["https://a.com/about", "https://a.com/blog", "https://a.com/blog/post-1", "https://a.com/contact"]
    );
    assert_eq!(result.external_links, vec!["https://github.com/acme", "https://twitter.com/acme"]);
}

#[tokio::test]
async fn page_budget_is_respected() {
    let browser = small_site();
    let result = Crawler::new(&browser, fast_config()).crawl("https://a.com", 2).await;

    assert_eq!(result.total_scanned, 2);
    assert_eq!(result.scanned_pages, vec!["https://a.com", "https://a.com/about"]);
    assert_eq!(
        result.internal_links,
        vec!["https://a.com/about", "https://a.com/blog", "https://a.com/contact"]
    );
    assert_eq!(browser.navigations().len(), 2);
}

#[tokio::test]
async fn no_page_is_visited_twice() {
    let browser = small_site();
    let result = Crawler::new(&browser, fast_config()).crawl("https://a.com", 30).await;

    let unique: HashSet<&String> = result.scanned_pages.iter().collect();
    assert_eq!(unique.len(), result.scanned_pages.len());
    let navigations = browser.navigations();
    let unique_navigations: HashSet<&String> = navigations.iter().collect();
    assert_eq!(unique_navigations.len(), navigations.len());
}

#[tokio::test]
async fn failing_page_is_skipped_without_retry() {
    let browser = small_site().failing_on("https://a.com/blog");
    let result = Crawler::new(&browser, fast_config()).crawl("https://a.com", 30).await;

    assert_eq!(result.total_scanned, 3);
    assert_eq!(result.scanned_pages, vec!["https://a.com", "https://a.com/about", "https://a.com/contact"]);
    // Enqueued before it failed, so it is still a known internal link.
    assert!(result.internal_links.contains(&"https://a.com/blog".to_string()));
    assert!(!result.internal_links.contains(&"https://a.com/blog/post-1".to_string()));
    let attempts = browser.navigations().iter().filter(|u| *u == "https://a.com/blog").count();
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn failed_page_is_not_retried_when_linked_again() {
    let browser = FakeBrowser::new(&[
        (
            "https://a.com",
            r#"<a href="/about">About</a><a href="/broken">Broken</a><a href="/contact">Contact</a>"#,
        ),
        ("https://a.com/about", r#"<a href="/x">X</a>"#),
        ("https://a.com/broken", "<p>never served</p>"),
        ("https://a.com/contact", r#"<a href="/broken">Broken again</a>"#),
        ("https://a.com/x", r#"<a href="/broken/">Broken once more</a>"#),
    ])
    .failing_on("https://a.com/broken");
    let result = Crawler::new(&browser, fast_config()).crawl("https://a.com", 30).await;

    assert_eq!(
        browser.navigations(),
        vec![
            "https://a.com",
            "https://a.com/about",
            "https://a.com/broken",
            "https://a.com/contact",
            "https://a.com/x",
        ]
    );
    assert_eq!(result.total_scanned, 4);
    assert!(result.internal_links.contains(&"https://a.com/broken".to_string()));
}

#[tokio::test]
async fn deadline_keeps_the_pages_mapped_so_far() {
    let browser = FakeBrowser::new(&[
        ("https://a.com", r#"<a href="/a">A</a><a href="/slow">Slow</a><a href="/b">B</a>"#),
        ("https://a.com/a", "<p>a</p>"),
        ("https://a.com/slow", "<p>slow</p>"),
        ("https://a.com/b", "<p>b</p>"),
    ])
    .stalling_on("https://a.com/slow");
    let deadline = Instant::now() + Duration::from_millis(300);
    let crawler = Crawler::new(&browser, fast_config()).with_deadline(deadline);

    let result = tokio::time::timeout(Duration::from_secs(5), crawler.crawl("https://a.com", 30)).await.unwrap();

    assert_eq!(result.scanned_pages, vec!["https://a.com", "https://a.com/a"]);
    assert_eq!(result.total_scanned, 2);
    assert!(result.internal_links.contains(&"https://a.com/b".to_string()));
    assert!(!browser.navigations().contains(&"https://a.com/b".to_string()));
}

#[tokio::test]
async fn unreachable_seed_yields_an_empty_map() {
    let browser = FakeBrowser::new(&[]);
    let result = Crawler::new(&browser, fast_config()).crawl("https://down.example", 10).await;
    assert_eq!(result.total_scanned, 0);
    assert!(result.scanned_pages.is_empty());
    assert!(result.internal_links.is_empty());
}
