//! Tracing setup for Undertow
//!
//! Console output follows the user's chosen level (or `RUST_LOG`), while a
//! per-run file in the logs directory captures everything at TRACE.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

const LOG_FILE_NAME: &str = "undertow-last-run.log";

/// Errors from installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("Cannot prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Installs console and file logging, returning the log file path.
///
/// The file is truncated on every run and defaults to `logs/`.
///
/// # Errors
/// - `TracingSetupError::LogFile` - Logs directory or file could not be created
/// - `TracingSetupError::AlreadyInitialized` - Called twice in one process
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, TracingSetupError> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = open_log_file(logs_path, &log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(log_file_path)
}

fn open_log_file(dir: &Path, path: &Path) -> Result<File, TracingSetupError> {
    let to_error = |source| TracingSetupError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    create_dir_all(dir).map_err(to_error)?;
    File::create(path).map_err(to_error)
}

/// Console verbosity selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warnings and errors
    Warn,
    /// Lifecycle events such as adds and evictions
    #[default]
    Info,
    /// Duplicate refreshes and sweep details
    Debug,
    /// Everything
    Trace,
}

impl CliLogLevel {
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tracing_level().as_str().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;

    use super::*;

    #[test]
    fn test_cli_level_maps_to_tracing_level() {
        assert_eq!(CliLogLevel::Warn.as_tracing_level(), Level::WARN);
        assert_eq!(CliLogLevel::default().as_tracing_level(), Level::INFO);
        assert_eq!(CliLogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_cli_level_parses_case_insensitively() {
        assert_eq!(CliLogLevel::from_str("DEBUG", true), Ok(CliLogLevel::Debug));
        assert!(CliLogLevel::from_str("loud", true).is_err());
    }

    #[test]
    fn test_log_file_is_created_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join(LOG_FILE_NAME);

        open_log_file(&nested, &path).unwrap();
        assert!(path.exists());
    }
}
