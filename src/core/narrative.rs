// src/core/narrative.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::NarrativeConfig;
use crate::core::error::ProbeError;
use crate::core::knowledge_base::rule_for_issue;
use crate::core::models::{NarrativeInput, ProbeResult, ScanMode};

pub const FAILURE_HEADING: &str = "# ⚠️ Report generation failed";
const DEFAULT_STACK_LABEL: &str = "Standard Web";

/// Turns a prompt into report text.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn generate(&self, prompt: &str) -> ProbeResult<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaNarrator {
    client: Client,
    config: NarrativeConfig,
}

impl OllamaNarrator {
    pub fn new(config: NarrativeConfig) -> ProbeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProbeError::tool("http", e))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl NarrativeService for OllamaNarrator {
    async fn generate(&self, prompt: &str) -> ProbeResult<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_ctx: self.config.num_ctx,
                temperature: self.config.temperature,
                top_p: self.config.top_p,
            },
        };
        let timeout = Duration::from_secs(self.config.timeout_secs);
        info!(model = %self.config.model, prompt_chars = prompt.len(), "Requesting narrative.");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest("narrative request", &e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Narrative service returned an error status.");
            return Err(ProbeError::NarrativeFailure(format!("status {}", status.as_u16())));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProbeError::parse("narrative response", e))?;
        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(ProbeError::NarrativeFailure("empty response".to_string()));
        }
        debug!(chars = text.len(), "Narrative received.");
        Ok(text)
    }
}

/// The clearly marked document returned in place of a narrative.
pub fn failure_narrative(err: &ProbeError) -> String {
    format!("{FAILURE_HEADING}\n\n{err}")
}

fn focus_line(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Frontend => "Focus on loading performance, Core Web Vitals and the listed opportunities.",
        ScanMode::Security => "Focus on the security headers, information leaks and certificate lifetime.",
        ScanMode::Backend => "Focus on server response time, hosting infrastructure and the detected stack.",
        ScanMode::Full | ScanMode::Crawl => "Cover performance, security and infrastructure with equal weight.",
    }
}

/// Builds the consultant-style prompt from normalized findings.
pub fn build_prompt(input: &NarrativeInput) -> String {
    let stack = if input.stack.is_empty() {
        DEFAULT_STACK_LABEL.to_string()
    } else {
        input.stack.join(", ")
    };
    let ssl = input
        .ssl_days
        .map(|d| format!("{d} days remaining"))
        .unwrap_or_else(|| "could not be verified".to_string());
    let issues = if input.security.issues.is_empty() {
        "- No critical header issues detected.".to_string()
    } else {
        input
            .security
            .issues
            .iter()
            .map(|i| match rule_for_issue(i) {
                Some(rule) => format!("- {i}\n  Risk: {}\n  Fix: {}", rule.risk, rule.remediation),
                None => format!("- {i}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut prompt = String::new();
    let _ = writeln!(prompt, "[ROLE]");
    let _ = writeln!(
        prompt,
        "You are a senior solutions architect and cybersecurity specialist hired for a thorough technical audit."
    );
    let _ = writeln!(prompt, "\n[TARGET DATA]");
    let _ = writeln!(prompt, "- Technology stack: {stack}");
    if let Some(theme) = &input.stack_details.theme {
        let _ = writeln!(prompt, "- WordPress theme: {theme}");
    }
    if !input.stack_details.plugins.is_empty() {
        let _ = writeln!(prompt, "- WordPress plugins: {}", input.stack_details.plugins.join(", "));
    }
    if input.stack_details.generated_code {
        let _ = writeln!(prompt, "- Markup shows signs of generated UI code (v0/shadcn).");
    }
    let _ = writeln!(prompt, "- TLS certificate: {ssl}");
    let _ = writeln!(prompt, "- Performance score: {}/100", input.score);
    let _ = writeln!(
        prompt,
        "- Core metrics: LCP={}, CLS={}, TTFB={}",
        input.metrics.lcp, input.metrics.cls, input.metrics.ttfb
    );
    let _ = writeln!(prompt, "- Security score: {}/100", input.security.score);
    let _ = writeln!(prompt, "- Security findings:\n{issues}");
    if !input.opportunities.is_empty() {
        let _ = writeln!(prompt, "- Top optimization opportunities:");
        for o in &input.opportunities {
            let _ = writeln!(prompt, "  - {} (~{:.0} ms LCP savings)", o.title, o.savings_ms);
        }
    }
    let html = &input.html_context;
    if html.title.is_some() || html.h1.is_some() || html.meta_description.is_some() {
        let _ = writeln!(
            prompt,
            "- Page context: title={:?}, h1={:?}, description={:?}",
            html.title.as_deref().unwrap_or(""),
            html.h1.as_deref().unwrap_or(""),
            html.meta_description.as_deref().unwrap_or("")
        );
    }

    let _ = writeln!(prompt, "\n[WRITING RULES]");
    let _ = writeln!(prompt, "1. Be detailed and explain the impact of every finding.");
    let _ = writeln!(prompt, "2. Do not invent data. Use only the numbers above.");
    let _ = writeln!(prompt, "3. Use Markdown tables to organize data.");
    let _ = writeln!(prompt, "4. {}", focus_line(input.mode));

    let _ = writeln!(prompt, "\n[REQUIRED STRUCTURE]");
    let _ = writeln!(prompt, "# Technical Audit Dossier: {stack}");
    let _ = writeln!(prompt, "## 1. Executive Summary");
    let _ = writeln!(prompt, "## 2. Infrastructure and Performance Analysis");
    let _ = writeln!(prompt, "(Compare the LCP of {} with Google's recommended values.)", input.metrics.lcp);
    let _ = writeln!(prompt, "## 3. Security Diagnosis");
    let _ = writeln!(prompt, "(Analyze the security score of {}/100 and the certificate lifetime.)", input.security.score);
    let _ = writeln!(prompt, "## 4. Remediation Roadmap");
    let _ = writeln!(prompt, "(Numbered steps with concrete configuration for {stack}.)");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{
        BackendReport, CoreMetrics, HtmlSummary, Opportunity, SecurityAssessment, StackDetails,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample_input(stack: Vec<String>) -> NarrativeInput {
        NarrativeInput {
            mode: ScanMode::Security,
            score: 72,
            stack,
            stack_details: StackDetails::default(),
            ssl_days: Some(41),
            html_context: HtmlSummary::default(),
            security: SecurityAssessment { score: 50, issues: vec!["Missing HSTS".to_string()] },
            metrics: CoreMetrics { lcp: "2.9 s".into(), cls: "0.02".into(), ttfb: "180 ms".into() },
            opportunities: vec![Opportunity {
                id: "unused-javascript".into(),
                title: "Reduce unused JavaScript".into(),
                savings_ms: 640.0,
            }],
        }
    }

    #[test]
    fn prompt_carries_the_findings() {
        let prompt = build_prompt(&sample_input(vec!["Nginx".into(), "WordPress".into()]));
        assert!(prompt.contains("Technology stack: Nginx, WordPress"));
        assert!(prompt.contains("Performance score: 72/100"));
        assert!(prompt.contains("LCP=2.9 s, CLS=0.02, TTFB=180 ms"));
        assert!(prompt.contains("- Missing HSTS"));
        assert!(prompt.contains("41 days remaining"));
        assert!(prompt.contains("Reduce unused JavaScript (~640 ms LCP savings)"));
        assert!(prompt.contains(focus_line(ScanMode::Security)));
    }

    #[test]
    fn empty_stack_falls_back_to_default_label() {
        let prompt = build_prompt(&sample_input(Vec::new()));
        assert!(prompt.contains("Technical Audit Dossier: Standard Web"));
    }

    #[test]
    fn degraded_backend_prompt_is_still_complete() {
        let backend = BackendReport::default();
        let input = crate::core::normalizer::normalize(ScanMode::Full, None, Some(&backend));
        let prompt = build_prompt(&input);
        assert!(prompt.contains("TLS certificate: could not be verified"));
        assert!(prompt.contains("Response headers could not be read"));
    }

    #[test]
    fn known_issues_carry_risk_and_fix() {
        let mut input = sample_input(Vec::new());
        input.security.issues = vec!["Missing HSTS (Strict-Transport-Security)".into()];
        let prompt = build_prompt(&input);
        assert!(prompt.contains("Risk: Without HSTS"));
        assert!(prompt.contains("Fix: Send 'Strict-Transport-Security"));
    }

    #[test]
    fn failure_document_is_marked() {
        let doc = failure_narrative(&ProbeError::NarrativeFailure("status 500".into()));
        assert!(doc.starts_with(FAILURE_HEADING));
        assert!(doc.contains("status 500"));
    }

    /// Consumes headers and a `Content-Length` body so closing the socket does not reset it.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            data.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Answers a single HTTP request with `status` and `body`.
    async fn one_shot_server(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn narrator(base_url: String) -> OllamaNarrator {
        OllamaNarrator::new(NarrativeConfig { base_url, timeout_secs: 5, ..Default::default() }).unwrap()
    }

    #[tokio::test]
    async fn successful_generation_returns_text() {
        let url = one_shot_server("200 OK", r##"{"model":"llama3.2","response":"# Report\nAll good.","done":true}"##).await;
        let text = narrator(url).generate("prompt").await.unwrap();
        assert_eq!(text, "# Report\nAll good.");
    }

    #[tokio::test]
    async fn error_status_is_a_narrative_failure() {
        let url = one_shot_server("500 Internal Server Error", r#"{"error":"model not loaded"}"#).await;
        let err = narrator(url).generate("prompt").await.unwrap_err();
        assert_eq!(err, ProbeError::NarrativeFailure("status 500".into()));
    }

    #[tokio::test]
    async fn empty_response_is_a_narrative_failure() {
        let url = one_shot_server("200 OK", r#"{"response":"   "}"#).await;
        let err = narrator(url).generate("prompt").await.unwrap_err();
        assert_eq!(err.kind(), "narrative_failure");
    }
}
