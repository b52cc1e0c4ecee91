// src/core/normalizer.rs

use std::cmp::Ordering;
use tracing::debug;

use crate::core::models::{
    AuditEntry, AuditorReport, BackendReport, CoreMetrics, NarrativeInput, Opportunity, ScanMode,
};

const LCP_AUDIT: &str = "largest-contentful-paint";
const CLS_AUDIT: &str = "cumulative-layout-shift";
const NOT_AVAILABLE: &str = "N/A";
const OPPORTUNITY_SCORE_CEILING: f64 = 0.9;
const MAX_OPPORTUNITIES: usize = 5;

/// Merges whatever the probes produced into the narrative input.
///
/// Pure and infallible: a missing auditor report yields score 0 and `"N/A"`
/// metrics, a missing backend report yields TTFB `"0 ms"` and an unavailable
/// security assessment.
pub fn normalize(
    mode: ScanMode,
    auditor: Option<&AuditorReport>,
    backend: Option<&BackendReport>,
) -> NarrativeInput {
    let fallback_backend = BackendReport::default();
    let backend = backend.unwrap_or(&fallback_backend);

    let score = auditor.map(performance_score).unwrap_or(0);
    let metrics = CoreMetrics {
        lcp: auditor.map(|r| display_value(r, LCP_AUDIT)).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        cls: auditor.map(|r| display_value(r, CLS_AUDIT)).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ttfb: format!("{} ms", backend.ttfb_ms),
    };
    let opportunities = auditor.map(top_opportunities).unwrap_or_default();
    debug!(score, opportunities = opportunities.len(), "Normalized stage results.");

    NarrativeInput {
        mode,
        score,
        stack: backend.stack.technologies.iter().cloned().collect(),
        stack_details: backend.stack.details.clone(),
        ssl_days: backend.ssl_days,
        html_context: backend.html.clone(),
        security: backend.security.clone(),
        metrics,
        opportunities,
    }
}

/// `round(score * 100)`, clamped to 0..=100; absent or null scores give 0.
fn performance_score(report: &AuditorReport) -> u8 {
    report
        .categories
        .performance
        .as_ref()
        .and_then(|p| p.score)
        .filter(|s| s.is_finite())
        .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

fn display_value(report: &AuditorReport, audit: &str) -> String {
    report
        .audits
        .get(audit)
        .and_then(|a| a.display_value.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn is_opportunity(audit: &AuditEntry) -> bool {
    let low_score = audit.score.is_some_and(|s| s < OPPORTUNITY_SCORE_CEILING);
    let kind = audit.details.as_ref().and_then(|d| d.kind.as_deref());
    low_score && kind == Some("opportunity")
}

/// Failing opportunity audits ordered by LCP savings (largest first, ties by id), at most five.
fn top_opportunities(report: &AuditorReport) -> Vec<Opportunity> {
    let mut found: Vec<Opportunity> = report
        .audits
        .iter()
        .filter(|(_, audit)| is_opportunity(audit))
        .map(|(id, audit)| Opportunity {
            id: id.clone(),
            title: audit.title.clone().unwrap_or_else(|| id.clone()),
            savings_ms: audit
                .metric_savings
                .as_ref()
                .and_then(|s| s.get("LCP").copied())
                .unwrap_or(0.0),
        })
        .collect();

    found.sort_by(|a, b| {
        b.savings_ms
            .partial_cmp(&a.savings_ms)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    found.truncate(MAX_OPPORTUNITIES);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AuditDetails, CategoryScore};
    use std::collections::BTreeMap;

    fn opportunity(score: f64, lcp_savings: Option<f64>) -> AuditEntry {
        AuditEntry {
            title: None,
            display_value: None,
            score: Some(score),
            details: Some(AuditDetails { kind: Some("opportunity".to_string()) }),
            metric_savings: lcp_savings.map(|v| BTreeMap::from([("LCP".to_string(), v)])),
        }
    }

    #[test]
    fn failed_auditor_degrades_to_placeholders() {
        let backend = BackendReport { ttfb_ms: 412, ..Default::default() };
        let input = normalize(ScanMode::Full, None, Some(&backend));
        assert_eq!(input.score, 0);
        assert_eq!(input.metrics.lcp, "N/A");
        assert_eq!(input.metrics.cls, "N/A");
        assert_eq!(input.metrics.ttfb, "412 ms");
        assert!(input.opportunities.is_empty());
    }

    #[test]
    fn both_probes_failed() {
        let input = normalize(ScanMode::Security, None, None);
        assert_eq!(input.metrics.ttfb, "0 ms");
        assert_eq!(input.security.score, 0);
        assert!(input.stack.is_empty());
        assert_eq!(input.ssl_days, None);
    }

    #[test]
    fn score_is_rounded_and_metrics_copied() {
        let mut report = AuditorReport::default();
        report.categories.performance = Some(CategoryScore { score: Some(0.876) });
        report.audits.insert(
            LCP_AUDIT.to_string(),
            AuditEntry { display_value: Some("3.4 s".to_string()), ..Default::default() },
        );
        let input = normalize(ScanMode::Frontend, Some(&report), None);
        assert_eq!(input.score, 88);
        assert_eq!(input.metrics.lcp, "3.4 s");
        assert_eq!(input.metrics.cls, "N/A");
    }

    #[test]
    fn opportunities_are_filtered_sorted_and_capped() {
        let mut report = AuditorReport::default();
        report.audits.insert("a-small".into(), opportunity(0.5, Some(100.0)));
        report.audits.insert("b-large".into(), opportunity(0.2, Some(900.0)));
        report.audits.insert("c-passing".into(), opportunity(0.95, Some(5000.0)));
        report.audits.insert("d-no-savings".into(), opportunity(0.1, None));
        report.audits.insert("e-tie".into(), opportunity(0.3, Some(100.0)));
        report.audits.insert("f-mid".into(), opportunity(0.4, Some(300.0)));
        report.audits.insert("g-mid".into(), opportunity(0.4, Some(250.0)));
        let mut diagnostic = opportunity(0.1, Some(800.0));
        diagnostic.details = Some(AuditDetails { kind: Some("table".to_string()) });
        report.audits.insert("h-diagnostic".into(), diagnostic);

        let input = normalize(ScanMode::Full, Some(&report), None);
        let ids: Vec<&str> = input.opportunities.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b-large", "f-mid", "g-mid", "a-small", "e-tie"]);
        assert_eq!(input.opportunities[0].title, "b-large");
    }
}
