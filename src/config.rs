// src/config.rs

//! Runtime configuration.
//!
//! Defaults are compiled in; `<config dir>/config.json` may override any
//! subset of fields, then a few environment variables, then CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::logging::get_config_dir;

pub const CONFIG_FILE: &str = "config.json";
pub const ENV_OLLAMA_URL: &str = "PERFSCAN_OLLAMA_URL";
pub const ENV_MODEL: &str = "PERFSCAN_MODEL";
pub const ENV_REPORTS_DIR: &str = "PERFSCAN_REPORTS_DIR";

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid configuration in {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub reports_dir: PathBuf,
    pub export_pdf: bool,
    /// Cadence of the status feed, independent of how long a stage takes.
    pub status_refresh_ms: u64,
    pub auditor: AuditorConfig,
    pub backend: BackendConfig,
    pub narrative: NarrativeConfig,
    pub crawl: CrawlConfig,
    pub recon: ReconConfig,
    pub stages: StageTimeouts,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            export_pdf: true,
            status_refresh_ms: 66,
            auditor: AuditorConfig::default(),
            backend: BackendConfig::default(),
            narrative: NarrativeConfig::default(),
            crawl: CrawlConfig::default(),
            recon: ReconConfig::default(),
            stages: StageTimeouts::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    pub command: String,
    pub chrome_flags: String,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            command: "lighthouse".to_string(),
            chrome_flags: "--headless --no-sandbox --disable-gpu --ignore-certificate-errors".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub tls_timeout_secs: u64,
    /// Fingerprint the browser-rendered DOM instead of the raw response body.
    pub render_dom: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            user_agent: DESKTOP_CHROME_UA.to_string(),
            request_timeout_secs: 60,
            tls_timeout_secs: 3,
            render_dom: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub num_ctx: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 240,
            num_ctx: 8192,
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_pages: usize,
    pub nav_timeout_secs: u64,
    pub scroll_rounds: u32,
    pub scroll_pause_ms: u64,
    pub user_agent: String,
    pub viewport: (u32, u32),
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 30,
            nav_timeout_secs: 20,
            scroll_rounds: 5,
            scroll_pause_ms: 500,
            user_agent: DESKTOP_CHROME_UA.to_string(),
            viewport: (1920, 1080),
        }
    }
}

impl CrawlConfig {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.nav_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub ports: Vec<u16>,
    pub port_timeout_ms: u64,
    pub concurrency: usize,
    pub subdomains: Vec<String>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            ports: vec![
                21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 993, 995, 1433, 3306, 3389,
                5432, 8080, 8443,
            ],
            port_timeout_ms: 500,
            concurrency: 10,
            subdomains: ["www", "mail", "api", "dev", "staging", "blog", "shop", "admin", "cdn", "app"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Upper bound for each stage, on top of the probes' own timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub frontend_secs: u64,
    pub backend_secs: u64,
    pub narrative_secs: u64,
    pub crawl_secs: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self { frontend_secs: 180, backend_secs: 90, narrative_secs: 250, crawl_secs: 1200 }
    }
}

impl ScanConfig {
    /// Loads `config.json` from the platform config directory if it exists,
    /// then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = get_config_dir().join(CONFIG_FILE);
        let mut config = if path.exists() { Self::load_from(&path)? } else { Self::default() };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        info!(path = %path.display(), "Loaded configuration file.");
        Ok(config)
    }

    /// Applies the `PERFSCAN_*` overrides, reading values through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.is_empty()) {
            debug!(url = %url, "Narrative base URL overridden from environment.");
            self.narrative.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
            self.narrative.model = model;
        }
        if let Some(dir) = lookup(ENV_REPORTS_DIR).filter(|v| !v.is_empty()) {
            self.reports_dir = PathBuf::from(dir);
        }
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_millis(self.status_refresh_ms.max(1))
    }
}
