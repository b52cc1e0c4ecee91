// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use std::path::PathBuf;
use time::macros::format_description;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "PERFSCAN_LOGLEVEL";
const LOG_FILE: &str = "perfscan.log";

/// Platform directories for perfscan, or `./.perfscan` when no home is known.
fn app_dir(pick: fn(&ProjectDirs) -> PathBuf, fallback: &str) -> PathBuf {
    ProjectDirs::from("com", "perfscan", "perfscan")
        .map(|dirs| pick(&dirs))
        .unwrap_or_else(|| PathBuf::from(".perfscan").join(fallback))
}

pub fn get_config_dir() -> PathBuf {
    app_dir(|d| d.config_local_dir().to_path_buf(), "config")
}

fn get_data_dir() -> PathBuf {
    app_dir(|d| d.data_local_dir().to_path_buf(), "data")
}

/// `RUST_LOG` wins over `PERFSCAN_LOGLEVEL`; with neither set, `perfscan=info`.
fn log_filter(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup("RUST_LOG")
        .or_else(|| lookup(LOG_LEVEL_ENV))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "perfscan=info".to_string())
}

/// Initializes file-based logging. The terminal belongs to the dashboard, so
/// nothing is written to stdout/stderr.
pub fn initialize_logging() -> Result<PathBuf> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE);
    let log_file = std::fs::File::create(&log_path)?;

    let timer = LocalTime::new(format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_timer(timer)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new(log_filter(|key| std::env::var(key).ok())));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}
