//! Download engine adapter contract
//!
//! The registry never talks to a peer-wire implementation directly. It hands
//! a normalized magnet URI to an [`EngineAdapter`] and receives a
//! [`TorrentHandle`]: immutable metadata plus an [`EngineSession`] capability
//! used for teardown and byte access.

pub mod simulated;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use simulated::SimulatedEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use test_mocks::MockEngine;

use crate::torrent::InfoHash;

/// Errors reported by an engine adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Engine failed to add {magnet_uri}: {reason}")]
    AddFailed { magnet_uri: String, reason: String },

    #[error("Engine failed to remove torrent {info_hash}: {reason}")]
    RemoveFailed { info_hash: InfoHash, reason: String },

    #[error("Engine read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("File index {index} out of range ({file_count} files)")]
    FileIndexOutOfRange { index: usize, file_count: usize },

    #[error("Engine session for {info_hash} is closed")]
    SessionClosed { info_hash: InfoHash },
}

/// File descriptor as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFile {
    pub name: String,
    /// Slash-rooted path inside the torrent, e.g. `/Movie/movie.mp4`.
    pub path: String,
    pub length: u64,
}

/// Metadata and capabilities for a torrent the engine has opened.
///
/// `files` is in the torrent's intrinsic order.
#[derive(Clone)]
pub struct TorrentHandle {
    pub info_hash: InfoHash,
    pub name: String,
    pub length: u64,
    pub files: Vec<EngineFile>,
    pub session: Arc<dyn EngineSession>,
}

impl fmt::Debug for TorrentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorrentHandle")
            .field("info_hash", &self.info_hash)
            .field("name", &self.name)
            .field("length", &self.length)
            .field("files", &self.files.len())
            .finish()
    }
}

/// Engine-side resource backing one open torrent.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Releases the torrent inside the engine.
    ///
    /// # Errors
    /// - `EngineError::RemoveFailed` - The engine could not tear the torrent down
    async fn remove(&self) -> Result<(), EngineError>;

    /// Reads up to `len` bytes of file `file_index` starting at `offset`.
    ///
    /// Returns fewer bytes only at end of file.
    ///
    /// # Errors
    /// - `EngineError::FileIndexOutOfRange` - No such file
    /// - `EngineError::SessionClosed` - Session was already removed
    /// - `EngineError::ReadFailed` - Data could not be produced
    async fn read(&self, file_index: usize, offset: u64, len: u64) -> Result<Bytes, EngineError>;
}

/// Capability surface of the underlying download engine.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Opens a torrent from a magnet URI and returns its metadata.
    ///
    /// May suspend for a long time while metadata is fetched from peers.
    ///
    /// # Errors
    /// - `EngineError::AddFailed` - Malformed URI or engine-level failure
    async fn add(&self, magnet_uri: &str) -> Result<TorrentHandle, EngineError>;
}
