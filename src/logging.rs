//! Log setup: timestamped plain-text lines on stdout and, optionally,
//! appended to a log file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Install the global subscriber.
///
/// `level` is the default filter; `RUST_LOG` overrides it. A log file path
/// that is empty or contains whitespace disables file output.
pub fn init(level: &str, log_file: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    let file_path = log_file.and_then(log_file_path);
    let file_layer = match &file_path {
        Some(path) => Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    if let (Some(raw), None) = (log_file, &file_path) {
        warn!(path = %raw, "Log file path is empty or contains whitespace, logging to stdout only");
    }

    Ok(())
}

/// Accept a log file path unless it is blank or contains whitespace.
pub fn log_file_path(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        None
    } else {
        Some(PathBuf::from(raw))
    }
}

/// Open a log file for appending, creating its parent directory if needed.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
