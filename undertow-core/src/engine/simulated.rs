//! In-memory engine producing deterministic torrents for development

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{EngineAdapter, EngineError, EngineFile, EngineSession, TorrentHandle};
use crate::config::SimulationConfig;
use crate::torrent::InfoHash;
use crate::torrent::parsing::magnet::parse_magnet_uri;

const SAMPLE_DIVISOR: u64 = 64;
const SUBTITLE_BYTES: u64 = 48 * 1024;

/// Engine adapter that fabricates torrent contents instead of downloading.
///
/// Every magnet gets three files: the main video, a short sample and a
/// subtitle track. Byte contents are a pure function of the info hash, file
/// index and offset, so streamed ranges can be verified in tests.
///
/// Adding a torrent that is already open fails, like a real engine rejecting
/// a duplicate.
#[derive(Clone)]
pub struct SimulatedEngine {
    config: SimulationConfig,
    open: Arc<Mutex<HashMap<InfoHash, Vec<EngineFile>>>>,
}

impl SimulatedEngine {
    /// Creates a simulated engine with the given parameters.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of torrents currently open inside the engine.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Returns whether the engine holds the torrent open.
    pub fn is_open(&self, info_hash: InfoHash) -> bool {
        self.open.lock().contains_key(&info_hash)
    }

    /// Byte the simulated file holds at `offset`.
    pub fn byte_at(info_hash: InfoHash, file_index: usize, offset: u64) -> u8 {
        let seed = info_hash.as_bytes()[0] as u64 + (file_index as u64) * 7;
        ((offset + seed) % 251) as u8
    }

    fn build_files(&self, name: &str) -> Vec<EngineFile> {
        let stem = name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(name);
        let main_length = self.config.main_file_bytes.max(1);

        vec![
            EngineFile {
                name: format!("{stem}.mp4"),
                path: format!("/{name}/{stem}.mp4"),
                length: main_length,
            },
            EngineFile {
                name: "sample.mp4".to_string(),
                path: format!("/{name}/Sample/sample.mp4"),
                length: (main_length / SAMPLE_DIVISOR).max(1),
            },
            EngineFile {
                name: format!("{stem}.srt"),
                path: format!("/{name}/{stem}.srt"),
                length: SUBTITLE_BYTES,
            },
        ]
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl EngineAdapter for SimulatedEngine {
    async fn add(&self, magnet_uri: &str) -> Result<TorrentHandle, EngineError> {
        let magnet = parse_magnet_uri(magnet_uri).map_err(|e| EngineError::AddFailed {
            magnet_uri: magnet_uri.to_string(),
            reason: e.to_string(),
        })?;

        if self.config.add_latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.add_latency_ms)).await;
        }

        let name = magnet
            .name
            .clone()
            .unwrap_or_else(|| format!("Torrent {}", &magnet.info_hash.to_hex()[..8]));
        let files = self.build_files(&name);

        {
            let mut open = self.open.lock();
            if open.contains_key(&magnet.info_hash) {
                return Err(EngineError::AddFailed {
                    magnet_uri: magnet_uri.to_string(),
                    reason: format!("Cannot add duplicate torrent {}", magnet.info_hash),
                });
            }
            open.insert(magnet.info_hash, files.clone());
        }

        tracing::debug!(info_hash = %magnet.info_hash, %name, "Simulated engine opened torrent");

        Ok(TorrentHandle {
            info_hash: magnet.info_hash,
            length: files.iter().map(|f| f.length).sum(),
            name,
            files,
            session: Arc::new(SimulatedSession {
                info_hash: magnet.info_hash,
                open: Arc::clone(&self.open),
            }),
        })
    }
}

struct SimulatedSession {
    info_hash: InfoHash,
    open: Arc<Mutex<HashMap<InfoHash, Vec<EngineFile>>>>,
}

#[async_trait]
impl EngineSession for SimulatedSession {
    async fn remove(&self) -> Result<(), EngineError> {
        match self.open.lock().remove(&self.info_hash) {
            Some(_) => {
                tracing::debug!(info_hash = %self.info_hash, "Simulated engine closed torrent");
                Ok(())
            }
            None => Err(EngineError::SessionClosed {
                info_hash: self.info_hash,
            }),
        }
    }

    async fn read(&self, file_index: usize, offset: u64, len: u64) -> Result<Bytes, EngineError> {
        let file_length = {
            let open = self.open.lock();
            let files = open.get(&self.info_hash).ok_or(EngineError::SessionClosed {
                info_hash: self.info_hash,
            })?;
            files
                .get(file_index)
                .ok_or(EngineError::FileIndexOutOfRange {
                    index: file_index,
                    file_count: files.len(),
                })?
                .length
        };

        let end = offset.saturating_add(len).min(file_length);
        let data: Vec<u8> = (offset.min(end)..end)
            .map(|position| SimulatedEngine::byte_at(self.info_hash, file_index, position))
            .collect();
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGNET: &str =
        "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=Big.Buck.Bunny.mkv";

    fn engine() -> SimulatedEngine {
        SimulatedEngine::new(SimulationConfig {
            add_latency_ms: 0,
            main_file_bytes: 64 * 1024,
        })
    }

    #[tokio::test]
    async fn test_add_builds_three_files_in_order() {
        let engine = engine();
        let handle = engine.add(MAGNET).await.unwrap();

        assert_eq!(handle.name, "Big.Buck.Bunny.mkv");
        let names: Vec<_> = handle.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Big.Buck.Bunny.mp4", "sample.mp4", "Big.Buck.Bunny.srt"]);
        assert!(handle.files.iter().all(|f| f.path.starts_with('/')));
        assert_eq!(
            handle.length,
            handle.files.iter().map(|f| f.length).sum::<u64>()
        );
        assert!(engine.is_open(handle.info_hash));
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let engine = engine();
        engine.add(MAGNET).await.unwrap();

        let err = engine.add(MAGNET).await.unwrap_err();
        assert!(matches!(err, EngineError::AddFailed { .. }));
        assert_eq!(engine.open_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_magnet_fails() {
        let err = engine().add("magnet:?dn=missing-hash").await.unwrap_err();
        assert!(matches!(err, EngineError::AddFailed { .. }));
    }

    #[tokio::test]
    async fn test_read_is_deterministic_and_clamped() {
        let engine = engine();
        let handle = engine.add(MAGNET).await.unwrap();
        let subtitle_len = handle.files[2].length;

        let chunk = handle.session.read(2, subtitle_len - 4, 100).await.unwrap();
        assert_eq!(chunk.len(), 4);
        for (i, byte) in chunk.iter().enumerate() {
            let expected = SimulatedEngine::byte_at(handle.info_hash, 2, subtitle_len - 4 + i as u64);
            assert_eq!(*byte, expected);
        }

        let past_end = handle.session.read(2, subtitle_len + 10, 8).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_remove_closes_session() {
        let engine = engine();
        let handle = engine.add(MAGNET).await.unwrap();

        handle.session.remove().await.unwrap();
        assert_eq!(engine.open_count(), 0);

        assert!(matches!(
            handle.session.read(0, 0, 1).await,
            Err(EngineError::SessionClosed { .. })
        ));
        assert!(handle.session.remove().await.is_err());
    }

    #[tokio::test]
    async fn test_read_rejects_unknown_file() {
        let engine = engine();
        let handle = engine.add(MAGNET).await.unwrap();

        let err = handle.session.read(9, 0, 1).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::FileIndexOutOfRange {
                index: 9,
                file_count: 3
            }
        ));
    }
}
