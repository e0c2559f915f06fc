use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Name of the per-user state directory under `$HOME`.
pub const APP_DIR: &str = ".review-insight";

/// File name prefix of the daily log files under `~/.review-insight/logs/`.
pub const LOG_FILE_PREFIX: &str = "review-insight";

// ── Directory bootstrap ────────────────────────────────────────────────────────

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Ensure the standard `~/.review-insight/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.review-insight/`
/// - `~/.review-insight/logs/`
/// - `~/.review-insight/cache/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let base = app_dir();
    std::fs::create_dir_all(&base)?;
    std::fs::create_dir_all(base.join("logs"))?;
    std::fs::create_dir_all(base.join("cache"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `DEBUG|INFO|WARNING|ERROR|CRITICAL` level name to a filter directive.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        other => other.to_lowercase(),
    }
}

/// Build the log file sink.
///
/// Without `log_file`, logs roll daily into `~/.review-insight/logs/`.
/// An explicit `log_file` is appended to as-is, without rotation.
pub fn log_appender(log_file: Option<&Path>) -> anyhow::Result<RollingFileAppender> {
    let builder = RollingFileAppender::builder();
    let appender = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)?;
            builder
                .rotation(Rotation::NEVER)
                .filename_prefix(name.to_string_lossy())
                .build(dir)?
        }
        None => {
            let dir = app_dir().join("logs");
            std::fs::create_dir_all(&dir)?;
            builder
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(dir)?
        }
    };
    Ok(appender)
}

/// Initialise the global `tracing` subscriber.
///
/// Events go to stderr so that reports on stdout stay machine-readable, and
/// to the log file from [`log_appender`] without ANSI colours. The returned
/// guard flushes the file writer and must be held until exit.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<WorkerGuard> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_writer, guard) = tracing_appender::non_blocking(log_appender(log_file)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

// ── Data-dir discovery ─────────────────────────────────────────────────────────

/// Locate the directory holding dated dataset directories.
///
/// An explicit directory is returned as given so that a missing path surfaces
/// as an error later. Otherwise the following are checked in order:
/// 1. `./data/`
/// 2. `~/.review-insight/data/`
pub fn discover_data_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    let candidates = [PathBuf::from("data"), app_dir().join("data")];
    candidates.into_iter().find(|p| p.is_dir())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
