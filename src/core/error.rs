// src/core/error.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure of a single probe, page visit, port check or lookup.
///
/// These never abort a scan: the orchestrator logs them and substitutes a
/// degraded result. They are kept as values so tests can assert on the
/// failure path.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeError {
    /// The auditor process, the browser or the HTTP client is unavailable or errored.
    #[error("external tool failure ({tool}): {message}")]
    ExternalToolFailure { tool: String, message: String },

    /// Navigation, connect, lookup or narrative call exceeded its deadline.
    #[error("{operation} timed out after {millis} ms")]
    NetworkTimeout { operation: String, millis: u64 },

    /// Malformed JSON or HTML coming back from a collaborator.
    #[error("could not parse {what}: {message}")]
    ParseFailure { what: String, message: String },

    /// Non-success answer from the inference service.
    #[error("narrative service failure: {0}")]
    NarrativeFailure(String),
}

impl ProbeError {
    pub fn tool(tool: &str, message: impl ToString) -> Self {
        Self::ExternalToolFailure { tool: tool.to_string(), message: message.to_string() }
    }

    pub fn timeout(operation: &str, after: std::time::Duration) -> Self {
        Self::NetworkTimeout {
            operation: operation.to_string(),
            millis: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn parse(what: &str, message: impl ToString) -> Self {
        Self::ParseFailure { what: what.to_string(), message: message.to_string() }
    }

    /// Maps a `reqwest` error, keeping timeouts distinct from other transport failures.
    pub fn from_reqwest(operation: &str, err: &reqwest::Error, after: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(operation, after)
        } else if err.is_decode() {
            Self::parse(operation, err)
        } else {
            Self::tool("http", err)
        }
    }

    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExternalToolFailure { .. } => "external_tool_failure",
            Self::NetworkTimeout { .. } => "network_timeout",
            Self::ParseFailure { .. } => "parse_failure",
            Self::NarrativeFailure(_) => "narrative_failure",
        }
    }
}

/// Errors that end a run in the `FAILED` state.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target URL '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("stage {stage} aborted unexpectedly: {message}")]
    StageAborted { stage: String, message: String },

    #[error("scan cancelled by operator")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeout_reports_operation_and_millis() {
        let err = ProbeError::timeout("navigation", Duration::from_secs(20));
        assert_eq!(err.to_string(), "navigation timed out after 20000 ms");
        assert_eq!(err.kind(), "network_timeout");
    }

    #[test]
    fn tool_failure_display() {
        let err = ProbeError::tool("lighthouse", "not found");
        assert_eq!(err.to_string(), "external tool failure (lighthouse): not found");
    }
}
