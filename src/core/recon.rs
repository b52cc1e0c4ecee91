// src/core/recon.rs

use futures_util::future::join_all;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ReconConfig;
use crate::core::error::ProbeError;
use crate::core::models::{ProbeResult, ReconResult};

const RECORD_TYPES: &[RecordType] = &[RecordType::A, RecordType::MX, RecordType::NS, RecordType::TXT];
const SUBDOMAIN_TIMEOUT: Duration = Duration::from_secs(2);
pub const UNKNOWN_IP: &str = "unknown";

/// Resolves the target's IP, its A/MX/NS/TXT records, common subdomains and
/// which of the configured ports accept a TCP connection.
///
/// Only an unparseable target is an error; every lookup failure just leaves
/// its part of the result empty.
pub async fn run_recon(url: &str, config: &ReconConfig) -> ProbeResult<ReconResult> {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .ok_or_else(|| ProbeError::parse("target url", format!("no host in {url}")))?;
    info!(host = %host, "Starting recon.");

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let (ip, dns_records, subdomains) = tokio::join!(
        resolve_ip(&host),
        lookup_dns_records(&resolver, &host),
        discover_subdomains(&host, &config.subdomains)
    );
    let open_ports = scan_ports(
        &host,
        &config.ports,
        Duration::from_millis(config.port_timeout_ms),
        config.concurrency,
    )
    .await;

    info!(ip = %ip, open_ports = open_ports.len(), record_types = dns_records.len(), "Recon finished.");
    Ok(ReconResult { ip, open_ports, dns_records, subdomains })
}

/// First resolved address of `host`, or `"unknown"`.
pub async fn resolve_ip(host: &str) -> String {
    match tokio::net::lookup_host((host, 0)).await {
        Ok(mut addrs) => addrs.next().map(|a| a.ip().to_string()).unwrap_or_else(|| UNKNOWN_IP.to_string()),
        Err(e) => {
            warn!(host, error = %e, "IP resolution failed.");
            UNKNOWN_IP.to_string()
        }
    }
}

/// Resolves each record type independently; types that fail are left out.
async fn lookup_dns_records(resolver: &TokioAsyncResolver, host: &str) -> BTreeMap<String, Vec<String>> {
    let lookups = RECORD_TYPES.iter().map(|&record_type| async move {
        match resolver.lookup(host, record_type).await {
            Ok(answer) => {
                let values: Vec<String> = answer.iter().map(|r| r.to_string()).collect();
                debug!(host, %record_type, count = values.len(), "DNS records found.");
                Some((record_type.to_string(), values))
            }
            Err(e) => {
                warn!(host, %record_type, error = %e, "DNS lookup failed.");
                None
            }
        }
    });
    join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .filter(|(_, values)| !values.is_empty())
        .collect()
}

/// Resolves `<label>.<root>` for every label; the root drops a leading `www.`.
async fn discover_subdomains(host: &str, labels: &[String]) -> Vec<String> {
    let root = host.strip_prefix("www.").unwrap_or(host);
    let probes = labels.iter().map(|label| {
        let candidate = format!("{label}.{root}");
        async move {
            let resolved = match timeout(SUBDOMAIN_TIMEOUT, tokio::net::lookup_host((candidate.as_str(), 80))).await {
                Ok(Ok(mut addrs)) => addrs.next().is_some(),
                _ => false,
            };
            resolved.then_some(candidate)
        }
    });
    let mut found: Vec<String> = join_all(probes).await.into_iter().flatten().collect();
    found.sort();
    debug!(root, found = found.len(), "Subdomain probing finished.");
    found
}

/// TCP connect scan. At most `concurrency` connects are in flight; a port is
/// open only if the connect succeeds within `per_port`. Returned ascending.
pub async fn scan_ports(host: &str, ports: &[u16], per_port: Duration, concurrency: usize) -> Vec<u16> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<u16>(ports.len().max(1));

    for &port in ports {
        let tx = tx.clone();
        let host = host.to_string();
        let permits = permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Ok(Ok(_stream)) = timeout(per_port, TcpStream::connect((host.as_str(), port))).await {
                debug!(port, "Port open.");
                let _ = tx.send(port).await;
            }
        });
    }
    drop(tx);

    let mut open = Vec::new();
    while let Some(port) = rx.recv().await {
        open.push(port);
    }
    open.sort_unstable();
    open
}
