//! Per-info-hash async locks.
//!
//! Mutations for one torrent are serialized while different torrents proceed
//! independently. Entries are created on demand and dropped with the last
//! guard or abandoned waiter, so the table only holds keys with in-flight
//! work.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::InfoHash;

type LockTable = Arc<Mutex<HashMap<InfoHash, Arc<AsyncMutex<()>>>>>;

#[derive(Debug, Default, Clone)]
pub(crate) struct KeyLocks {
    table: LockTable,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder owns `info_hash`, then returns the guard.
    ///
    /// Cancel-safe: dropping the future while it waits releases its claim on
    /// the table entry.
    pub(crate) async fn lock(&self, info_hash: InfoHash) -> KeyGuard {
        let entry = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(info_hash).or_default())
        };

        // Built before awaiting so a cancelled wait still runs the cleanup.
        let mut held = KeyGuard {
            info_hash,
            table: Arc::clone(&self.table),
            entry: Some(Arc::clone(&entry)),
            guard: None,
        };
        held.guard = Some(entry.lock_owned().await);
        held
    }

    /// Number of keys with a holder or waiter.
    #[cfg(test)]
    pub(crate) fn active_keys(&self) -> usize {
        self.table.lock().len()
    }
}

/// Exclusive hold on one info hash; released on drop.
pub(crate) struct KeyGuard {
    info_hash: InfoHash,
    table: LockTable,
    entry: Option<Arc<AsyncMutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        // Release our references first so the count reflects only others.
        self.guard.take();
        self.entry.take();
        if let Some(entry) = table.get(&self.info_hash) {
            // Only the table itself still references the mutex.
            if Arc::strong_count(entry) == 1 {
                table.remove(&self.info_hash);
            }
        }
    }
}
