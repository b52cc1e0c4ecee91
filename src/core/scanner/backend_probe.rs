// src/core/scanner/backend_probe.rs

use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::crawler::browser::BrowserSession;
use crate::core::error::ProbeError;
use crate::core::models::{BackendReport, HtmlSummary, ProbeResult};
use crate::core::scanner::fingerprint_scanner::detect_stack;
use crate::core::scanner::headers_scanner::{assess_security_headers, collect_headers};
use crate::core::scanner::ssl_scanner::ssl_days_remaining;

/// Fetches the target once for TTFB, status, headers and the security
/// assessment. The TLS expiry check runs alongside. Stack signature and HTML
/// summary come from the rendered DOM when `renderer` is given, so markers
/// injected client-side are seen; otherwise from the raw body.
///
/// A failed TLS check only leaves `ssl_days` empty; a failed request fails the probe.
pub async fn run_backend_check<B: BrowserSession + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Duration,
    tls_timeout: Duration,
    renderer: Option<(&B, Duration)>,
) -> ProbeResult<BackendReport> {
    info!(url, "Starting backend check.");
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .ok_or_else(|| ProbeError::parse("target url", format!("no host in {url}")))?;

    let (response, ssl_days) = tokio::join!(
        fetch(client, url, request_timeout),
        ssl_days_remaining(&host, tls_timeout)
    );

    let ssl_days = match ssl_days {
        Ok(days) => Some(days),
        Err(e) => {
            warn!(host = %host, error = %e, kind = e.kind(), "TLS expiry check failed.");
            None
        }
    };

    let (ttfb_ms, status_code, headers, body) = response?;
    let security = assess_security_headers(&headers);
    let document = match renderer {
        Some((browser, nav_timeout)) => rendered_or_raw(browser, url, nav_timeout, body).await,
        None => body,
    };
    let stack = detect_stack(&document, &headers);
    let html = summarize_html(&document);

    info!(
        ttfb_ms,
        status_code,
        security_score = security.score,
        technologies = stack.technologies.len(),
        "Backend check finished."
    );
    Ok(BackendReport { ttfb_ms, status_code, headers, security, stack, ssl_days, html })
}

type Fetched = (u64, u16, std::collections::BTreeMap<String, String>, String);

async fn fetch(client: &reqwest::Client, url: &str, request_timeout: Duration) -> ProbeResult<Fetched> {
    let start = Instant::now();
    let response = client.get(url).timeout(request_timeout).send().await.map_err(|e| {
        error!(url, error = %e, "HTTP request failed for backend check.");
        ProbeError::from_reqwest("backend request", &e, request_timeout)
    })?;
    let ttfb_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status_code = response.status().as_u16();
    let headers = collect_headers(response.headers());
    debug!(ttfb_ms, status_code, headers = headers.len(), "Response headers received.");

    let body = response
        .text()
        .await
        .map_err(|e| ProbeError::from_reqwest("backend body", &e, request_timeout))?;
    Ok((ttfb_ms, status_code, headers, body))
}

/// The rendered DOM of `url`, or `raw` when the browser cannot produce one.
pub async fn rendered_or_raw<B: BrowserSession + ?Sized>(
    browser: &B,
    url: &str,
    nav_timeout: Duration,
    raw: String,
) -> String {
    let rendered = match browser.navigate(url, nav_timeout).await {
        Ok(()) => browser.content().await,
        Err(e) => Err(e),
    };
    match rendered {
        Ok(html) if !html.trim().is_empty() => {
            debug!(url, chars = html.len(), "Using rendered DOM for fingerprinting.");
            html
        }
        Ok(_) => raw,
        Err(e) => {
            warn!(url, error = %e, kind = e.kind(), "Rendered DOM unavailable, using the raw body.");
            raw
        }
    }
}

/// Title, first `<h1>` and meta description, each trimmed; blanks become `None`.
pub fn summarize_html(html: &str) -> HtmlSummary {
    let document = Html::parse_document(html);
    HtmlSummary {
        title: first_text(&document, "title"),
        h1: first_text(&document, "h1"),
        meta_description: Selector::parse(r#"meta[name="description"]"#).ok().and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
        }),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Serves one fixed DOM, or fails every navigation.
    struct StaticDom(Option<&'static str>);

    #[async_trait]
    impl BrowserSession for StaticDom {
        async fn navigate(&self, _url: &str, timeout: Duration) -> ProbeResult<()> {
            match self.0 {
                Some(_) => Ok(()),
                None => Err(ProbeError::timeout("navigation", timeout)),
            }
        }

        async fn scroll_to_bottom(&self) -> ProbeResult<()> {
            Ok(())
        }

        async fn content(&self) -> ProbeResult<String> {
            Ok(self.0.unwrap_or_default().to_string())
        }

        async fn close(&self) -> ProbeResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn client_side_markup_is_fingerprinted_from_the_rendered_dom() {
        let raw = r#"<html><body><div id="root"></div></body></html>"#.to_string();
        let browser = StaticDom(Some(
            r#"<html><head><title>Shop</title></head><body><div id="__next" data-reactroot></div></body></html>"#,
        ));
        let document = rendered_or_raw(&browser, "https://a.com", Duration::from_secs(1), raw).await;
        let stack = detect_stack(&document, &std::collections::BTreeMap::new());
        assert!(stack.technologies.contains("React"));
        assert_eq!(summarize_html(&document).title.as_deref(), Some("Shop"));
    }

    #[tokio::test]
    async fn failed_render_falls_back_to_the_raw_body() {
        let raw = "<title>Raw</title>".to_string();
        let document = rendered_or_raw(&StaticDom(None), "https://a.com", Duration::from_secs(1), raw).await;
        assert_eq!(document, "<title>Raw</title>");

        let blank = rendered_or_raw(&StaticDom(Some("  ")), "https://a.com", Duration::from_secs(1), "<p>x</p>".into()).await;
        assert_eq!(blank, "<p>x</p>");
    }

    #[test]
    fn summary_extracts_title_h1_and_description() {
        let html = r#"<html><head><title> Acme  Store </title>
            <meta name="description" content="Buy things"></head>
            <body><h1>Welcome <span>home</span></h1><h1>Second</h1></body></html>"#;
        let summary = summarize_html(html);
        assert_eq!(summary.title.as_deref(), Some("Acme Store"));
        assert_eq!(summary.h1.as_deref(), Some("Welcome home"));
        assert_eq!(summary.meta_description.as_deref(), Some("Buy things"));
    }

    #[test]
    fn summary_of_bare_page_is_empty() {
        assert_eq!(summarize_html("<p>x</p>"), HtmlSummary::default());
    }
}
