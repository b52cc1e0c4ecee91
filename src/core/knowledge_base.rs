// src/core/knowledge_base.rs

//! Static, read-only table of the response headers the security assessment
//! looks at, with the fixed penalty each one carries and the text shown to
//! the operator and the narrative service.
//! Keeping it data-driven lets the scoring rules be tested without any I/O.

/// How a header affects the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRuleKind {
    /// The header should be present; its absence is penalised.
    Required,
    /// The header leaks implementation details; its presence is penalised.
    Leak,
    /// The header discloses server details; noted but not penalised.
    Disclosure,
}

/// One row of the header table.
pub struct HeaderRule {
    /// Lower-case header name.
    pub header: &'static str,
    pub kind: HeaderRuleKind,
    /// Points removed from the starting score of 100 when the rule fires.
    pub penalty: u8,
    /// Issue text. For `Leak`/`Disclosure` rules the header value is appended.
    pub issue: &'static str,
    /// What the header protects against, for the narrative prompt.
    pub risk: &'static str,
    pub remediation: &'static str,
}

pub static HEADER_RULES: &[HeaderRule] = &[
    HeaderRule {
        header: "strict-transport-security",
        kind: HeaderRuleKind::Required,
        penalty: 20,
        issue: "Missing HSTS (Strict-Transport-Security)",
        risk: "Without HSTS a browser may be downgraded to plain HTTP, exposing sessions to man-in-the-middle interception.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains' on every HTTPS response.",
    },
    HeaderRule {
        header: "x-frame-options",
        kind: HeaderRuleKind::Required,
        penalty: 20,
        issue: "Clickjacking exposure (missing X-Frame-Options)",
        risk: "Pages can be framed by another origin and used to trick visitors into unintended clicks.",
        remediation: "Send 'X-Frame-Options: DENY' or 'SAMEORIGIN', or an equivalent CSP frame-ancestors directive.",
    },
    HeaderRule {
        header: "x-content-type-options",
        kind: HeaderRuleKind::Required,
        penalty: 10,
        issue: "Missing X-Content-Type-Options (MIME sniffing)",
        risk: "Browsers may sniff content types and execute uploaded files as scripts.",
        remediation: "Send 'X-Content-Type-Options: nosniff'.",
    },
    HeaderRule {
        header: "x-powered-by",
        kind: HeaderRuleKind::Leak,
        penalty: 10,
        issue: "Information leak: X-Powered-By",
        risk: "Advertising the framework and version helps attackers pick known exploits.",
        remediation: "Remove the X-Powered-By header in the application or reverse proxy.",
    },
    HeaderRule {
        header: "server",
        kind: HeaderRuleKind::Disclosure,
        penalty: 0,
        issue: "Server banner exposed",
        risk: "The server banner reveals software that can be fingerprinted.",
        remediation: "Reduce the Server header to a generic value (e.g. 'server_tokens off' on Nginx).",
    },
];

/// Finds the rule that produced an assessment issue line.
pub fn rule_for_issue(issue: &str) -> Option<&'static HeaderRule> {
    HEADER_RULES.iter().find(|r| issue.starts_with(r.issue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_penalty_cannot_exceed_the_starting_score() {
        let total: u32 = HEADER_RULES.iter().map(|r| u32::from(r.penalty)).sum();
        assert!(total <= 100);
    }

    #[test]
    fn header_names_are_lower_case() {
        assert!(HEADER_RULES.iter().all(|r| r.header == r.header.to_ascii_lowercase()));
    }

    #[test]
    fn issues_map_back_to_their_rule() {
        let rule = rule_for_issue("Information leak: X-Powered-By: Express").unwrap();
        assert_eq!(rule.header, "x-powered-by");
        assert!(rule_for_issue("Something else").is_none());
    }
}
