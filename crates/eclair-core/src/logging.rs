//! Logging setup and structured error records
//!
//! Components never reach for a global logger: each one takes a
//! `tracing::Span` at construction and logs under it. This module only wires
//! up the subscriber for binaries and records errors with their context.

use std::path::Path;

use tracing::{error, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Subscriber options
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    /// Raise the default filter to `info,eclair_core=debug`
    pub verbose: bool,
    /// Also write logs to this file
    pub log_file: Option<&'a Path>,
}

/// Default filter directive for the given verbosity
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,eclair_core=debug,eclair_mcp=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. When a log file is configured the
/// returned guard must be kept alive to flush it.
pub fn init(options: LogOptions<'_>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(options.verbose)));

    match options.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path.file_name().ok_or_else(|| {
                Error::Config(format!("Invalid log file path: {}", path.display()))
            })?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(
                    std::io::stderr
                        .with_max_level(tracing::Level::ERROR)
                        .and(file_writer),
                )
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))?;
            Ok(None)
        }
    }
}

/// Record an error with its category, suggestions, and caller context
pub fn log_error(span: &Span, err: &Error, context: &[(&str, &str)]) {
    let context = context
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");

    error!(
        parent: span,
        category = err.category(),
        suggestions = ?err.suggestions(),
        context = %context,
        "{}",
        err
    );
}
