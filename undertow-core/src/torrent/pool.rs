//! Torrent pool service: a registry plus its sweep worker, with explicit
//! start and stop.

use std::sync::Arc;

use tracing::{info, warn};

use super::parsing::LinkParser;
use super::registry::TorrentRegistry;
use super::sweeper::{SweepWorker, SweepWorkerHandle};
use crate::UndertowError;
use crate::config::UndertowConfig;
use crate::engine::EngineAdapter;

/// Owns the registry and the background sweep for the lifetime of a service.
pub struct TorrentPool {
    registry: Arc<TorrentRegistry>,
    worker: SweepWorkerHandle,
}

impl TorrentPool {
    /// Builds the registry over `engine` and starts the sweep worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `UndertowError::Http` - Link parser HTTP client could not be built
    pub fn start(
        config: &UndertowConfig,
        engine: Arc<dyn EngineAdapter>,
    ) -> Result<Self, UndertowError> {
        let parser = LinkParser::new(&config.resolver)?;
        let registry = TorrentRegistry::new(config.pool.clone(), engine).with_parser(parser);
        Ok(Self::with_registry(registry))
    }

    /// Starts the sweep worker over an already configured registry.
    pub fn with_registry(registry: TorrentRegistry) -> Self {
        let registry = Arc::new(registry);
        let worker = SweepWorker::spawn(Arc::clone(&registry));

        info!(
            idle_ttl_secs = registry.config().idle_ttl_secs,
            "Torrent pool started"
        );
        Self { registry, worker }
    }

    pub fn registry(&self) -> Arc<TorrentRegistry> {
        Arc::clone(&self.registry)
    }

    /// Stops the sweep worker, then removes every remaining torrent from the
    /// engine. Returns the number of torrents that could not be removed.
    pub async fn shutdown(self) -> usize {
        self.worker.shutdown().await;

        let mut failed = 0;
        for record in self.registry.get_torrents() {
            if let Err(e) = self.registry.remove_torrent(record.info_hash).await {
                failed += 1;
                warn!(info_hash = %record.info_hash, error = %e, "Torrent left open at shutdown");
            }
        }

        info!(failed, "Torrent pool stopped");
        failed
    }
}
