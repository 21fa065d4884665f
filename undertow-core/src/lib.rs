//! Undertow Core - torrent pool management for streaming servers
//!
//! Tracks torrents opened in a download engine, deduplicates them by info
//! hash, evicts idle ones in the background and picks files from loose
//! selection criteria. The engine itself sits behind [`EngineAdapter`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod torrent;
pub mod tracing_setup;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, UndertowConfig};
pub use engine::{EngineAdapter, EngineError, SimulatedEngine};
pub use torrent::{
    FileCriteria, FileRecord, InfoHash, TorrentError, TorrentPool, TorrentRecord, TorrentRegistry,
    find_file,
};

/// Errors that can surface from any Undertow subsystem.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl UndertowError {
    /// Returns a short message suitable for end users.
    pub fn user_message(&self) -> String {
        match self {
            UndertowError::Torrent(TorrentError::InvalidInput { reason, .. }) => {
                format!("Invalid torrent link: {reason}")
            }
            UndertowError::Torrent(TorrentError::TorrentNotFound { info_hash }) => {
                format!("Torrent {info_hash} not found")
            }
            UndertowError::Torrent(TorrentError::Engine(_)) | UndertowError::Engine(_) => {
                "Download engine error occurred".to_string()
            }
            UndertowError::Config(e) => format!("Configuration error: {e}"),
            UndertowError::Io(_) => "File system error occurred".to_string(),
            UndertowError::Http(_) => "Network error occurred".to_string(),
        }
    }

    /// Checks if this error was caused by user input.
    pub fn is_user_error(&self) -> bool {
        match self {
            UndertowError::Torrent(e) => e.is_user_error(),
            UndertowError::Config(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, UndertowError>;
