//! Logging initialization for stepwise.
//!
//! Logs go to stderr by default so they never interleave with the
//! interactive prompt on stdout. With `logging.to_file` they are written to
//! `{logging.directory}/stepwise-{datetime}.log` instead.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Keeps the file writer flushing until dropped
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,

    /// Set when `logging.to_file` is on
    pub log_file_path: Option<PathBuf>,
}

/// Level filter used when RUST_LOG is not set
pub fn effective_level(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// Log file name for the given moment
pub fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("stepwise-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

/// Install the global subscriber for the `stepwise` binary.
///
/// `RUST_LOG` wins over `logging.level`; `--debug` raises the configured
/// level only. Stderr output keeps ANSI colors, file output does not. Keep
/// the returned handle alive until exit or buffered file lines are lost.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(effective_level(config, debug_override)));

    let (writer, guard, log_file_path) = if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let file_name = log_file_name(chrono::Utc::now());
        let appender = tracing_appender::rolling::never(&logs_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (
            BoxMakeWriter::new(non_blocking),
            Some(guard),
            Some(logs_dir.join(file_name)),
        )
    } else {
        (BoxMakeWriter::new(std::io::stderr), None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(log_file_path.is_none())
                .with_writer(writer),
        )
        .init();

    Ok(LoggingHandle {
        _guard: guard,
        log_file_path,
    })
}
