//! In-memory torrent registry
//!
//! Tracks every torrent the engine holds open, keyed by info hash. All
//! mutations for a given info hash are serialized through [`KeyLocks`], so a
//! duplicate add never reaches the engine twice and a sweep never races an
//! explicit removal. Reads take a short synchronous lock and never suspend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;

use super::file_resolver::{FileCriteria, find_file};
use super::key_locks::KeyLocks;
use super::parsing::LinkParser;
use super::{InfoHash, TorrentError};
use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::engine::{EngineAdapter, EngineError, EngineFile, EngineSession, TorrentHandle};

/// One file inside a tracked torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub name: String,
    /// Slash-rooted path inside the torrent
    pub path: String,
    pub length: u64,
    /// MIME type guessed from `name`, empty when unknown
    #[serde(rename = "type")]
    pub file_type: String,
}

impl FileRecord {
    /// Creates a record, classifying the file by its name.
    pub fn new(name: String, path: String, length: u64) -> Self {
        let file_type = mime_guess::from_path(&name)
            .first_raw()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            path,
            length,
            file_type,
        }
    }
}

impl From<EngineFile> for FileRecord {
    fn from(file: EngineFile) -> Self {
        Self::new(file.name, file.path, file.length)
    }
}

/// A torrent held open by the engine, enriched with registry bookkeeping.
///
/// Cloning is cheap and yields a snapshot; `updated` on a clone does not
/// follow later refreshes.
#[derive(Clone)]
pub struct TorrentRecord {
    pub info_hash: InfoHash,
    /// Locator the torrent was first added with
    pub link: String,
    pub name: String,
    pub length: u64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Files in the torrent's own order
    pub files: Vec<FileRecord>,
    seq: u64,
    session: Arc<dyn EngineSession>,
}

impl TorrentRecord {
    fn from_handle(
        handle: TorrentHandle,
        info_hash: InfoHash,
        link: &str,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            info_hash,
            link: link.to_string(),
            name: handle.name,
            length: handle.length,
            created: now,
            updated: now,
            files: handle.files.into_iter().map(FileRecord::from).collect(),
            seq,
            session: handle.session,
        }
    }

    /// Tears the torrent down inside the engine.
    ///
    /// # Errors
    /// - `EngineError` - Engine refused or failed the teardown
    pub async fn remove(&self) -> Result<(), EngineError> {
        self.session.remove().await
    }

    /// Reads a byte range of file `file_index`.
    ///
    /// # Errors
    /// - `EngineError` - File index unknown, session closed or read failure
    pub async fn read(&self, file_index: usize, offset: u64, len: u64) -> Result<Bytes, EngineError> {
        self.session.read(file_index, offset, len).await
    }

    /// Resolves `criteria` to a file and its zero-based position.
    pub fn find_file(&self, criteria: &FileCriteria) -> Option<(usize, &FileRecord)> {
        let file = find_file(&self.files, criteria)?;
        let index = self.files.iter().position(|f| std::ptr::eq(f, file))?;
        Some((index, file))
    }
}

impl fmt::Debug for TorrentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorrentRecord")
            .field("info_hash", &self.info_hash)
            .field("link", &self.link)
            .field("name", &self.name)
            .field("length", &self.length)
            .field("created", &self.created)
            .field("updated", &self.updated)
            .field("files", &self.files)
            .finish()
    }
}

/// Counters from one completed sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Torrents present when the pass started
    pub examined: usize,
    pub evicted: usize,
    /// Expired torrents whose engine teardown failed; still tracked
    pub failed: usize,
}

/// Result of requesting a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running; nothing was done
    Skipped,
}

/// Holds the registry-wide sweep flag; clears it on drop even if the sweep
/// future is cancelled.
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Active torrent set backed by an [`EngineAdapter`].
pub struct TorrentRegistry {
    config: PoolConfig,
    engine: Arc<dyn EngineAdapter>,
    parser: LinkParser,
    clock: Arc<dyn Clock>,
    torrents: RwLock<HashMap<InfoHash, TorrentRecord>>,
    key_locks: KeyLocks,
    next_seq: AtomicU64,
    sweeping: AtomicBool,
    sweep_requested: Notify,
}

impl TorrentRegistry {
    /// Creates an empty registry using the system clock and a default link
    /// parser.
    pub fn new(config: PoolConfig, engine: Arc<dyn EngineAdapter>) -> Self {
        Self {
            config,
            engine,
            parser: LinkParser::default(),
            clock: Arc::new(SystemClock),
            torrents: RwLock::new(HashMap::new()),
            key_locks: KeyLocks::new(),
            next_seq: AtomicU64::new(0),
            sweeping: AtomicBool::new(false),
            sweep_requested: Notify::new(),
        }
    }

    /// Replaces the link parser, e.g. one configured with fetch limits.
    pub fn with_parser(mut self, parser: LinkParser) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Adds the torrent `link` points at, or refreshes it if already tracked.
    ///
    /// A tracked torrent only has its `updated` timestamp bumped; the engine
    /// is not called again. Concurrent adds of the same content wait for the
    /// first one and then take the refresh path.
    ///
    /// # Errors
    /// - `TorrentError::InvalidInput` - Link could not be resolved
    /// - `TorrentError::Engine` - Engine failed to open the torrent
    pub async fn add_torrent(&self, link: &str) -> Result<TorrentRecord, TorrentError> {
        let parsed = self.parser.parse(link).await?;
        let info_hash = parsed.info_hash;

        let _guard = self.key_locks.lock(info_hash).await;

        if let Some(record) = self.refresh(info_hash) {
            tracing::debug!(%info_hash, updated = %record.updated, "Refreshed existing torrent");
            return Ok(record);
        }

        let handle = self.engine.add(&parsed.magnet_uri).await.map_err(|e| {
            tracing::warn!(%info_hash, error = %e, "Engine failed to add torrent");
            e
        })?;

        if handle.info_hash != info_hash {
            tracing::warn!(
                %info_hash,
                engine_info_hash = %handle.info_hash,
                "Engine reported a different info hash"
            );
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let record = TorrentRecord::from_handle(handle, info_hash, link, self.clock.now(), seq);
        self.torrents.write().insert(info_hash, record.clone());

        tracing::info!(
            %info_hash,
            name = %record.name,
            files = record.files.len(),
            length = record.length,
            "Added torrent"
        );

        self.sweep_requested.notify_one();
        Ok(record)
    }

    /// Returns a snapshot of the torrent, if tracked.
    pub fn get_torrent(&self, info_hash: InfoHash) -> Option<TorrentRecord> {
        self.torrents.read().get(&info_hash).cloned()
    }

    /// Returns snapshots of all tracked torrents in insertion order.
    pub fn get_torrents(&self) -> Vec<TorrentRecord> {
        let mut records: Vec<TorrentRecord> = self.torrents.read().values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    pub fn len(&self) -> usize {
        self.torrents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.read().is_empty()
    }

    /// Tears the torrent down in the engine, then stops tracking it.
    ///
    /// Returns `false` if the torrent was not tracked. When the engine fails
    /// the record stays in place so the removal can be retried.
    ///
    /// # Errors
    /// - `TorrentError::Engine` - Engine teardown failed
    pub async fn remove_torrent(&self, info_hash: InfoHash) -> Result<bool, TorrentError> {
        let _guard = self.key_locks.lock(info_hash).await;
        self.remove_locked(info_hash).await
    }

    /// Evicts every torrent idle for longer than the configured TTL.
    ///
    /// Only one sweep runs at a time; a call made while another is active
    /// returns [`SweepOutcome::Skipped`] immediately. Failed removals are
    /// logged and counted, and do not stop the pass.
    pub async fn check_for_expired_torrents(&self) -> SweepOutcome {
        let Some(_sweep) = SweepGuard::acquire(&self.sweeping) else {
            tracing::debug!("Sweep already running, skipping");
            return SweepOutcome::Skipped;
        };

        let ttl = TimeDelta::from_std(self.config.idle_ttl()).unwrap_or(TimeDelta::MAX);
        let snapshot = self.get_torrents();
        let started = self.clock.now();
        let mut report = SweepReport {
            examined: snapshot.len(),
            ..SweepReport::default()
        };

        for record in snapshot.iter().filter(|r| is_expired(r, started, ttl)) {
            let info_hash = record.info_hash;
            let _guard = self.key_locks.lock(info_hash).await;

            // An add may have refreshed it while we waited for the key.
            let still_expired = self
                .torrents
                .read()
                .get(&info_hash)
                .is_some_and(|current| is_expired(current, self.clock.now(), ttl));
            if !still_expired {
                continue;
            }

            match self.remove_locked(info_hash).await {
                Ok(true) => {
                    report.evicted += 1;
                    tracing::info!(%info_hash, idle_since = %record.updated, "Evicted idle torrent");
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(%info_hash, error = %e, "Failed to evict idle torrent");
                }
            }
        }

        tracing::debug!(
            examined = report.examined,
            evicted = report.evicted,
            failed = report.failed,
            "Sweep finished"
        );
        SweepOutcome::Completed(report)
    }

    /// Signalled once per newly added torrent.
    pub(crate) fn sweep_requested(&self) -> &Notify {
        &self.sweep_requested
    }

    fn refresh(&self, info_hash: InfoHash) -> Option<TorrentRecord> {
        let mut torrents = self.torrents.write();
        let record = torrents.get_mut(&info_hash)?;
        record.updated = record.updated.max(self.clock.now());
        Some(record.clone())
    }

    /// Caller must hold the key lock for `info_hash`.
    async fn remove_locked(&self, info_hash: InfoHash) -> Result<bool, TorrentError> {
        let Some(record) = self.get_torrent(info_hash) else {
            return Ok(false);
        };

        if let Err(e) = record.remove().await {
            tracing::warn!(%info_hash, error = %e, "Engine failed to remove torrent, keeping record");
            return Err(e.into());
        }

        self.torrents.write().remove(&info_hash);
        tracing::info!(%info_hash, name = %record.name, "Removed torrent");
        Ok(true)
    }
}

fn is_expired(record: &TorrentRecord, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.signed_duration_since(record.updated) > ttl
}
