// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info};

use crate::core::error::ProbeError;
use crate::core::models::ProbeResult;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use x509_parser::prelude::*;

/// Number of whole days until the host's TLS certificate expires (negative once expired).
///
/// The handshake is blocking, so it runs on the blocking pool.
pub async fn ssl_days_remaining(host: &str, connect_timeout: Duration) -> ProbeResult<i64> {
    info!(host, "Starting TLS expiry check.");
    let host_owned = host.to_string();

    spawn_blocking(move || perform_tls_check(&host_owned, connect_timeout))
        .await
        .unwrap_or_else(|e| {
            error!(panic = %e, "Blocking TLS check task panicked!");
            Err(ProbeError::tool("tls", format!("task panicked: {e}")))
        })
}

fn perform_tls_check(host: &str, connect_timeout: Duration) -> ProbeResult<i64> {
    let connector = TlsConnector::new().map_err(|e| {
        error!(error = %e, "Failed to create TlsConnector");
        ProbeError::tool("tls", e)
    })?;

    let addr = (host, 443)
        .to_socket_addrs()
        .map_err(|e| ProbeError::tool("dns", e))?
        .next()
        .ok_or_else(|| ProbeError::tool("dns", format!("no address for {host}")))?;

    debug!(host, %addr, "Connecting TCP stream to port 443.");
    let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            ProbeError::timeout("tls connect", connect_timeout)
        } else {
            ProbeError::tool("tls", format!("TCP connection error: {e}"))
        }
    })?;
    stream.set_read_timeout(Some(connect_timeout)).ok();
    stream.set_write_timeout(Some(connect_timeout)).ok();

    debug!(host, "Performing TLS handshake.");
    let stream = connector
        .connect(host, stream)
        .map_err(|e| ProbeError::tool("tls", format!("TLS handshake error: {e}")))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| ProbeError::tool("tls", e))?
        .ok_or_else(|| ProbeError::tool("tls", "server did not present a certificate"))?;

    let cert_der = cert.to_der().map_err(|e| ProbeError::parse("certificate", e))?;
    let (_, x509) =
        parse_x509_certificate(&cert_der).map_err(|e| ProbeError::parse("certificate", e))?;

    let not_after = asn1_time_to_chrono_utc(&x509.validity().not_after);
    let days_left = days_until(not_after, Utc::now());
    info!(subject = %x509.subject(), days_left, "Parsed certificate.");
    Ok(days_left)
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    not_after.signed_duration_since(now).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn days_until_counts_whole_days() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2026, 1, 31, 11, 0, 0).unwrap();
        assert_eq!(days_until(expiry, now), 29);
        assert_eq!(days_until(now, expiry), -29);
    }
}
