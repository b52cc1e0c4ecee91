// src/core/models.rs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};

use crate::core::error::ProbeError;

// --- Reusable Result Types ---
// Every probe, page visit and lookup reports through this alias.
pub type ProbeResult<T> = Result<T, ProbeError>;

// --- Session / State Machine ---

/// What the operator asked for. All audit modes run every probe; the mode only
/// changes the focus of the narrative. `Crawl` takes the site-map branch instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Frontend,
    Security,
    Backend,
    #[default]
    Full,
    Crawl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStage {
    #[default]
    Init,
    FrontendScan,
    DeepScan,
    DataNormalization,
    AiAnalysis,
    SiteCrawl,
    Finished,
    Failed,
}

impl ScanStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStage::Finished | ScanStage::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub message: String,
}

/// The live state of one audit run.
///
/// Only the orchestrator holds a mutable copy; observers receive clones through
/// a `watch` channel, so every value they see is an immutable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSession {
    pub target: String,
    pub mode: ScanMode,
    pub stage: ScanStage,
    pub status_message: String,
    pub started_at: DateTime<Local>,
    pub progress: u8,
    pub log: Vec<LogLine>,
    /// Count of every line ever pushed, including ones dropped from `log`.
    pub log_seq: u64,
    pub transitions: Vec<ScanStage>,
    pub stack: Vec<String>,
    pub security_score: Option<u8>,
}

impl ScanSession {
    pub const MAX_LOG_LINES: usize = 200;

    pub fn new(target: &str, mode: ScanMode) -> Self {
        Self {
            target: target.to_string(),
            mode,
            stage: ScanStage::Init,
            status_message: "INITIALIZING".to_string(),
            started_at: Local::now(),
            progress: 0,
            log: Vec::new(),
            log_seq: 0,
            transitions: vec![ScanStage::Init],
            stack: Vec::new(),
            security_score: None,
        }
    }

    pub(crate) fn enter(&mut self, stage: ScanStage, status: &str, progress: u8) {
        if self.stage != stage {
            self.transitions.push(stage);
        }
        self.stage = stage;
        self.status_message = status.to_string();
        self.progress = progress.min(100);
    }

    pub(crate) fn push_log(&mut self, message: impl Into<String>) {
        self.log.push(LogLine { at: Local::now(), message: message.into() });
        self.log_seq += 1;
        if self.log.len() > Self::MAX_LOG_LINES {
            let overflow = self.log.len() - Self::MAX_LOG_LINES;
            self.log.drain(..overflow);
        }
    }

    /// Lines pushed after the first `seen` ones that are still retained.
    pub fn lines_since(&self, seen: u64) -> impl Iterator<Item = &LogLine> {
        let first_retained = self.log_seq - self.log.len() as u64;
        let skip = usize::try_from(seen.saturating_sub(first_retained)).unwrap_or(usize::MAX);
        self.log.iter().skip(skip)
    }

    pub(crate) fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }
}

// --- Frontend (page-speed auditor) Models ---

/// The subset of the auditor's JSON report that the normalizer reads.
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorReport {
    pub categories: AuditorCategories,
    pub audits: BTreeMap<String, AuditEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorCategories {
    pub performance: Option<CategoryScore>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryScore {
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditEntry {
    pub title: Option<String>,
    pub display_value: Option<String>,
    pub score: Option<f64>,
    pub details: Option<AuditDetails>,
    pub metric_savings: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditDetails {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// --- Backend / Security / Stack Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    /// Always within `0..=100`.
    pub score: u8,
    pub issues: Vec<String>,
}

impl SecurityAssessment {
    /// Used when no response headers could be read at all.
    pub fn unavailable() -> Self {
        Self { score: 0, issues: vec!["Response headers could not be read".to_string()] }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDetails {
    pub theme: Option<String>,
    pub plugins: Vec<String>,
    pub generated_code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackSignature {
    pub technologies: BTreeSet<String>,
    pub details: StackDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlSummary {
    pub title: Option<String>,
    pub h1: Option<String>,
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendReport {
    pub ttfb_ms: u64,
    pub status_code: u16,
    /// Lower-cased header names; repeated headers joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub security: SecurityAssessment,
    pub stack: TechStackSignature,
    pub ssl_days: Option<i64>,
    pub html: HtmlSummary,
}

impl Default for BackendReport {
    fn default() -> Self {
        Self {
            ttfb_ms: 0,
            status_code: 0,
            headers: BTreeMap::new(),
            security: SecurityAssessment::unavailable(),
            stack: TechStackSignature::default(),
            ssl_days: None,
            html: HtmlSummary::default(),
        }
    }
}

// --- Normalized Narrative Input ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreMetrics {
    pub lcp: String,
    pub cls: String,
    pub ttfb: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub savings_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeInput {
    pub mode: ScanMode,
    pub score: u8,
    pub stack: Vec<String>,
    pub stack_details: StackDetails,
    pub ssl_days: Option<i64>,
    pub html_context: HtmlSummary,
    pub security: SecurityAssessment,
    pub metrics: CoreMetrics,
    pub opportunities: Vec<Opportunity>,
}

// --- Crawl / Recon Contracts ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// In visit order.
    pub scanned_pages: Vec<String>,
    pub internal_links: Vec<String>,
    pub external_links: Vec<String>,
    pub total_scanned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconResult {
    /// Resolved address, or `"unknown"`.
    pub ip: String,
    pub open_ports: Vec<u16>,
    pub dns_records: BTreeMap<String, Vec<String>>,
    pub subdomains: Vec<String>,
}
