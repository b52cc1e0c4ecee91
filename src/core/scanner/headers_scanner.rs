// src/core/scanner/headers_scanner.rs

use std::collections::BTreeMap;
use tracing::debug;

use crate::core::knowledge_base::{HEADER_RULES, HeaderRuleKind};
use crate::core::models::SecurityAssessment;
use reqwest::header::HeaderMap;

/// Flattens a `reqwest` header map into lower-cased names. Repeated headers
/// are joined with ", " and non-UTF-8 values are replaced by a placeholder.
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = match value.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                debug!(header_name = %name, "Header contained invalid UTF-8.");
                "[Invalid UTF-8]".to_string()
            }
        };
        collected
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

/// Scores a set of response headers against the header rule table.
///
/// The score starts at 100 and loses each firing rule's fixed penalty; it is
/// clamped to `0..=100`. An empty header set means nothing could be read and
/// scores 0.
///
/// # Arguments
/// * `headers` - Header names mapped to values; names are matched case-insensitively.
pub fn assess_security_headers(headers: &BTreeMap<String, String>) -> SecurityAssessment {
    if headers.is_empty() {
        debug!("No headers available, security assessment unavailable.");
        return SecurityAssessment::unavailable();
    }

    let lowered: BTreeMap<String, &str> =
        headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.as_str())).collect();

    let mut score: i32 = 100;
    let mut issues = Vec::new();

    for rule in HEADER_RULES {
        let present = lowered.get(rule.header);
        let fired = match (rule.kind, present) {
            (HeaderRuleKind::Required, None) => Some(rule.issue.to_string()),
            (HeaderRuleKind::Leak | HeaderRuleKind::Disclosure, Some(value)) => {
                Some(format!("{}: {}", rule.issue, value))
            }
            _ => None,
        };
        if let Some(issue) = fired {
            debug!(header = rule.header, penalty = rule.penalty, "Header rule fired.");
            score -= i32::from(rule.penalty);
            issues.push(issue);
        }
    }

    SecurityAssessment { score: score.clamp(0, 100) as u8, issues }
}
