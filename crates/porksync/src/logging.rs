//! Logging setup
//!
//! Every event goes to stdout and is appended to the log file. Both layers
//! print a timestamp; the file layer has ANSI colours turned off.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*};

/// Keeps the subscriber installed; flushes the log file on drop
#[derive(Debug)]
pub struct LoggingGuard {
    _default: DefaultGuard,
    file: Arc<File>,
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        let _ = self.file.sync_data();
    }
}

/// Install the stdout + file subscriber for the current thread
///
/// # Parameters
///
/// - `log_file`: File to append to, created if missing
/// - `level`: One of trace, debug, info, warn, error
pub fn init(log_file: &Path, level: &str) -> Result<LoggingGuard> {
    let level: LevelFilter = level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
    let file = Arc::new(file);

    let subscriber = tracing_subscriber::registry()
        .with(level)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::clone(&file)),
        );

    Ok(LoggingGuard {
        _default: tracing::subscriber::set_default(subscriber),
        file,
    })
}
