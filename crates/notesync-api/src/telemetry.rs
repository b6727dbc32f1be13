//! Tracing subscriber setup.
//!
//! `RUST_LOG` selects the filter (default `info`). `LOG_FORMAT` picks
//! human-readable or JSON lines; `LOG_FILE` redirects output to a daily
//! rolling file written through a non-blocking worker.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use notesync_core::Error;

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE_NAME: &str = "notesync-api.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!(
                "LOG_FORMAT must be \"text\" or \"json\", got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Log to this file (rotated daily) instead of stdout.
    pub file: Option<PathBuf>,
}

/// Split a log file path into the rolling appender's directory and file
/// name prefix.
fn appender_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_LOG_FILE_NAME)
        .to_string();
    (dir, name)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file; dropping it flushes and stops the writer thread.
pub fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = match &config.file {
        Some(path) => {
            let (dir, name) = appender_target(path);
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            match config.format {
                LogFormat::Json => registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .try_init(),
                LogFormat::Text => registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_ansi(false)
                            .with_writer(writer),
                    )
                    .try_init(),
            }
            .context("failed to install tracing subscriber")?;
            Some(guard)
        }
        None => {
            match config.format {
                LogFormat::Json => registry
                    .with(tracing_subscriber::fmt::layer().json())
                    .try_init(),
                LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
            }
            .context("failed to install tracing subscriber")?;
            None
        }
    };

    info!(
        subsystem = "api",
        component = "telemetry",
        log_format = ?config.format,
        log_file = config
            .file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stdout)".to_string()),
        "Logging initialized"
    );
    Ok(guard)
}
