//! Tracing subscriber setup for the certrelay binary.
//!
//! Log lines go to stdout and, optionally, are appended to a log file so a
//! cron-driven run leaves a trail behind.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Logging options resolved from the CLI and configuration
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// File to append log lines to, in addition to stdout
    pub log_file: Option<PathBuf>,
}

impl LogSettings {
    pub fn new(verbose: bool) -> Self {
        Self {
            default_level: if verbose { "debug" } else { "info" }.to_string(),
            log_file: None,
        }
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Install the global tracing subscriber
pub fn init_tracing(settings: &LogSettings) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_level));

    let file_layer = match &settings.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_level() {
        assert_eq!(LogSettings::new(false).default_level, "info");
        assert_eq!(LogSettings::new(true).default_level, "debug");
    }

    #[test]
    fn test_unwritable_log_file_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = LogSettings::new(false)
            .with_log_file(Some(dir.path().join("missing").join("certrelay.log")));

        let err = init_tracing(&settings).unwrap_err();
        assert!(matches!(err, LoggingError::LogFile { .. }));
    }
}
