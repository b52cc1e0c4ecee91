// src/core/scanner/frontend_probe.rs

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::AuditorConfig;
use crate::core::error::ProbeError;
use crate::core::models::{AuditorReport, ProbeResult};

/// Runs the page-speed auditor against `url` and parses its JSON report from stdout.
///
/// The child is killed if this future is dropped, so a stage timeout does not
/// leave an orphaned Chrome behind.
pub async fn run_frontend_audit(url: &str, config: &AuditorConfig) -> ProbeResult<AuditorReport> {
    info!(url, command = %config.command, "Starting frontend audit.");

    let output = Command::new(&config.command)
        .arg(url)
        .args(["--output=json", "--output-path=stdout", "--quiet"])
        .arg(format!("--chrome-flags={}", config.chrome_flags))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            error!(error = %e, "Could not spawn the auditor.");
            ProbeError::tool(&config.command, e)
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        error!(status = %output.status, stderr = %tail, "Auditor exited with failure.");
        return Err(ProbeError::tool(&config.command, format!("exited with {}: {tail}", output.status)));
    }

    debug!(bytes = output.stdout.len(), "Auditor report received.");
    parse_auditor_report(&output.stdout)
}

/// Parses raw auditor output. An empty or non-JSON body is a `ParseFailure`.
pub fn parse_auditor_report(raw: &[u8]) -> ProbeResult<AuditorReport> {
    serde_json::from_slice(raw).map_err(|e| ProbeError::parse("auditor report", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_output_is_a_parse_failure() {
        let err = parse_auditor_report(b"Runtime error encountered").unwrap_err();
        assert_eq!(err.kind(), "parse_failure");
    }

    #[test]
    fn minimal_report_parses() {
        let report = parse_auditor_report(br#"{"categories":{"performance":{"score":0.93}},"audits":{}}"#).unwrap();
        assert_eq!(report.categories.performance.unwrap().score, Some(0.93));
    }

    #[tokio::test]
    async fn missing_binary_is_an_external_tool_failure() {
        let config = AuditorConfig {
            command: "perfscan-no-such-auditor-binary".to_string(),
            ..AuditorConfig::default()
        };
        let err = run_frontend_audit("https://example.com", &config).await.unwrap_err();
        assert_eq!(err.kind(), "external_tool_failure");
    }
}
