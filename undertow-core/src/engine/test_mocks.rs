//! Mock engine for exercising the registry without real downloads.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{EngineAdapter, EngineError, EngineFile, EngineSession, TorrentHandle};
use crate::torrent::InfoHash;
use crate::torrent::parsing::magnet::parse_magnet_uri;

/// Engine double that records calls and can be told to fail.
///
/// Each torrent gets `{name}.mkv`, `Sample.mkv` and `{name}.srt`. Clones
/// share state, so a test can keep one handle while the registry owns another.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    fail_adds: AtomicBool,
    fail_next_adds: AtomicUsize,
    add_latency: Mutex<Duration>,
    remove_latency: Mutex<Duration>,
    failing_removals: Mutex<HashSet<InfoHash>>,
    open: Mutex<HashSet<InfoHash>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `add` invocations, successful or not.
    pub fn add_calls(&self) -> usize {
        self.state.add_calls.load(Ordering::SeqCst)
    }

    /// Number of session `remove` invocations, successful or not.
    pub fn remove_calls(&self) -> usize {
        self.state.remove_calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `add` fail while set.
    pub fn fail_adds(&self, fail: bool) {
        self.state.fail_adds.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` calls to `add` fail.
    pub fn fail_next_adds(&self, count: usize) {
        self.state.fail_next_adds.store(count, Ordering::SeqCst);
    }

    pub fn set_add_latency(&self, latency: Duration) {
        *self.state.add_latency.lock() = latency;
    }

    pub fn set_remove_latency(&self, latency: Duration) {
        *self.state.remove_latency.lock() = latency;
    }

    /// Makes teardown of `info_hash` fail while set.
    pub fn fail_removal(&self, info_hash: InfoHash, fail: bool) {
        let mut failing = self.state.failing_removals.lock();
        if fail {
            failing.insert(info_hash);
        } else {
            failing.remove(&info_hash);
        }
    }

    pub fn is_open(&self, info_hash: InfoHash) -> bool {
        self.state.open.lock().contains(&info_hash)
    }

    pub fn open_count(&self) -> usize {
        self.state.open.lock().len()
    }

    fn take_failure(&self) -> bool {
        if self.state.fail_adds.load(Ordering::SeqCst) {
            return true;
        }
        self.state
            .fail_next_adds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EngineAdapter for MockEngine {
    async fn add(&self, magnet_uri: &str) -> Result<TorrentHandle, EngineError> {
        self.state.add_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self.take_failure();

        let latency = *self.state.add_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if should_fail {
            return Err(EngineError::AddFailed {
                magnet_uri: magnet_uri.to_string(),
                reason: "Mock add failure".to_string(),
            });
        }

        let magnet = parse_magnet_uri(magnet_uri).map_err(|e| EngineError::AddFailed {
            magnet_uri: magnet_uri.to_string(),
            reason: e.to_string(),
        })?;
        let name = magnet.name.unwrap_or_else(|| "mock".to_string());

        let files = vec![
            EngineFile {
                name: format!("{name}.mkv"),
                path: format!("/{name}/{name}.mkv"),
                length: 1_000_000,
            },
            EngineFile {
                name: "Sample.mkv".to_string(),
                path: format!("/{name}/Sample.mkv"),
                length: 10_000,
            },
            EngineFile {
                name: format!("{name}.srt"),
                path: format!("/{name}/{name}.srt"),
                length: 2_000,
            },
        ];

        self.state.open.lock().insert(magnet.info_hash);

        Ok(TorrentHandle {
            info_hash: magnet.info_hash,
            name,
            length: files.iter().map(|f| f.length).sum(),
            session: Arc::new(MockSession {
                info_hash: magnet.info_hash,
                file_lengths: files.iter().map(|f| f.length).collect(),
                state: Arc::clone(&self.state),
            }),
            files,
        })
    }
}

struct MockSession {
    info_hash: InfoHash,
    file_lengths: Vec<u64>,
    state: Arc<MockState>,
}

#[async_trait]
impl EngineSession for MockSession {
    async fn remove(&self) -> Result<(), EngineError> {
        self.state.remove_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.state.remove_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.state.failing_removals.lock().contains(&self.info_hash) {
            return Err(EngineError::RemoveFailed {
                info_hash: self.info_hash,
                reason: "Mock removal failure".to_string(),
            });
        }

        self.state.open.lock().remove(&self.info_hash);
        Ok(())
    }

    async fn read(&self, file_index: usize, offset: u64, len: u64) -> Result<Bytes, EngineError> {
        if !self.state.open.lock().contains(&self.info_hash) {
            return Err(EngineError::SessionClosed {
                info_hash: self.info_hash,
            });
        }

        let file_length =
            *self
                .file_lengths
                .get(file_index)
                .ok_or(EngineError::FileIndexOutOfRange {
                    index: file_index,
                    file_count: self.file_lengths.len(),
                })?;

        let end = offset.saturating_add(len).min(file_length);
        Ok(Bytes::from(vec![0xAB; end.saturating_sub(offset) as usize]))
    }
}
