// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use perfscan::config::ScanConfig;
use perfscan::core::models::ScanMode;
use perfscan::core::narrative::OllamaNarrator;
use perfscan::core::orchestrator::{Orchestrator, OrchestratorSettings, normalize_target};
use perfscan::core::recon::run_recon;
use perfscan::core::scanner::LiveProbes;
use perfscan::logging::initialize_logging;
use perfscan::report::{ReportKind, export_pdf, save_report};
use perfscan::ui::{self, DashboardExit};

#[derive(Debug, Parser)]
#[command(name = "perfscan", version, about = "Website performance and security audit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Audit a site (or map it with --mode crawl) and save a markdown report
    Scan {
        /// Target URL; https:// is assumed when no scheme is given
        url: String,
        /// frontend, security, backend, full or crawl
        #[arg(long, default_value = "full")]
        mode: ScanMode,
        /// Page budget for crawl mode
        #[arg(long)]
        max_pages: Option<usize>,
        /// Print progress lines instead of the dashboard
        #[arg(long)]
        plain: bool,
        /// Skip the pandoc PDF export
        #[arg(long)]
        no_pdf: bool,
        /// Directory for saved reports
        #[arg(long, value_name = "DIR")]
        reports_dir: Option<PathBuf>,
    },
    /// Resolve IP, DNS records, common subdomains and open ports; prints JSON
    Recon {
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let log_path = initialize_logging()?;
    let mut config = ScanConfig::load().wrap_err("loading configuration")?;
    info!(log = %log_path.display(), "perfscan starting.");

    match Cli::parse().command {
        Commands::Scan { url, mode, max_pages, plain, no_pdf, reports_dir } => {
            if let Some(max_pages) = max_pages {
                config.crawl.max_pages = max_pages;
            }
            if let Some(dir) = reports_dir {
                config.reports_dir = dir;
            }
            if no_pdf {
                config.export_pdf = false;
            }
            let plain = plain || !std::io::stdout().is_terminal();
            run_scan(Arc::new(config), &url, mode, plain).await
        }
        Commands::Recon { url } => {
            let target = normalize_target(&url)?;
            let result = run_recon(&target, &config.recon).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

async fn run_scan(config: Arc<ScanConfig>, url: &str, mode: ScanMode, plain: bool) -> Result<()> {
    let probes = Arc::new(LiveProbes::new(config.clone())?);
    let narrator = Arc::new(OllamaNarrator::new(config.narrative.clone())?);
    let (orchestrator, rx) = Orchestrator::new(probes, narrator, OrchestratorSettings::from_config(&config));
    let cancel = orchestrator.cancellation_token();

    let target = url.to_string();
    let scan = tokio::spawn(async move { orchestrator.run(&target, mode).await });

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let refresh = config.status_refresh();
    if plain {
        ui::run_plain(rx, refresh).await;
    } else if ui::run_dashboard(rx, refresh).await? == DashboardExit::QuitRequested {
        cancel.cancel();
    }

    let text = match scan.await? {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Scan did not complete.");
            return Err(eyre!(e));
        }
    };

    let kind = if mode == ScanMode::Crawl { ReportKind::Map } else { ReportKind::Audit };
    let path = save_report(&config.reports_dir, url, &text, kind)?;
    println!("Report saved to {}", path.display());

    if config.export_pdf {
        match export_pdf(&path).await {
            Ok(pdf) => println!("PDF saved to {}", pdf.display()),
            Err(e) => warn!(error = %e, "PDF export skipped."),
        }
    }
    Ok(())
}
