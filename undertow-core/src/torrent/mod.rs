//! Torrent lifecycle management: identity, link parsing, registry and file selection

pub mod file_resolver;
mod key_locks;
pub mod parsing;
pub mod pool;
pub mod registry;
pub mod sweeper;

use std::fmt;
use std::str::FromStr;

pub use file_resolver::{FileCriteria, find_file};
pub use parsing::{LinkParser, ParsedLink};
pub use pool::TorrentPool;
pub use registry::{FileRecord, SweepOutcome, SweepReport, TorrentRecord, TorrentRegistry};
pub use sweeper::{SweepWorker, SweepWorkerHandle};

use crate::engine::EngineError;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
/// Stable across locators: a magnet link and the `.torrent` it was built
/// from map to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40-character hexadecimal info hash (either case).
    ///
    /// # Errors
    /// - `InfoHashError` - Wrong length or non-hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self, InfoHashError> {
        if hex_str.len() != 40 {
            return Err(InfoHashError {
                reason: format!("expected 40 hex characters, got {}", hex_str.len()),
            });
        }

        let mut hash = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut hash).map_err(|e| InfoHashError {
            reason: format!("invalid hex: {e}"),
        })?;
        Ok(Self(hash))
    }

    /// Parses a 32-character RFC 4648 base32 info hash, as found in some
    /// magnet links.
    ///
    /// # Errors
    /// - `InfoHashError` - Wrong length or characters outside the alphabet
    pub fn from_base32(encoded: &str) -> Result<Self, InfoHashError> {
        if encoded.len() != 32 {
            return Err(InfoHashError {
                reason: format!("expected 32 base32 characters, got {}", encoded.len()),
            });
        }

        let mut hash = [0u8; 20];
        let mut buffer: u64 = 0;
        let mut bits = 0u32;
        let mut out = 0usize;

        for ch in encoded.bytes() {
            let upper = ch.to_ascii_uppercase();
            let value = BASE32_ALPHABET
                .iter()
                .position(|&c| c == upper)
                .ok_or_else(|| InfoHashError {
                    reason: format!("invalid base32 character '{}'", ch as char),
                })?;

            buffer = (buffer << 5) | value as u64;
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                hash[out] = (buffer >> bits) as u8;
                out += 1;
            }
        }

        Ok(Self(hash))
    }

    /// Returns the lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for InfoHash {
    type Err = InfoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            40 => Self::from_hex(s),
            32 => Self::from_base32(s),
            len => Err(InfoHashError {
                reason: format!("unsupported info hash length {len}"),
            }),
        }
    }
}

impl serde::Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for InfoHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Rejected info hash text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid info hash: {reason}")]
pub struct InfoHashError {
    pub reason: String,
}

/// Errors surfaced by the torrent registry.
///
/// `InvalidInput` is the caller's fault and maps to a client error;
/// `Engine` means the download engine refused or failed the operation.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Cannot parse torrent: {reason}, link: {link}")]
    InvalidInput { link: String, reason: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Torrent {info_hash} not found")]
    TorrentNotFound { info_hash: InfoHash },
}

impl TorrentError {
    /// Checks if this error was caused by the caller's input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, TorrentError::InvalidInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(info_hash.to_hex(), info_hash.to_string());
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        let lower = InfoHash::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        let upper = InfoHash::from_hex("0123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(InfoHash::from_hex("abc").is_err());
        assert!(InfoHash::from_hex("zz23456789abcdef0123456789abcdef01234567").is_err());
    }

    #[test]
    fn test_base32_matches_hex() {
        let zeros = InfoHash::from_base32("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(zeros, InfoHash::new([0u8; 20]));

        let ones = InfoHash::from_base32("77777777777777777777777777777777").unwrap();
        assert_eq!(ones, InfoHash::new([0xff; 20]));

        let mixed = InfoHash::from_base32("aebagbafaydqqcikbmga2dqpcaireeyu").unwrap();
        assert_eq!(mixed.to_hex(), "0102030405060708090a0b0c0d0e0f1011121314");
    }

    #[test]
    fn test_from_str_dispatches_on_length() {
        assert!("0123456789abcdef0123456789abcdef01234567".parse::<InfoHash>().is_ok());
        assert!("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse::<InfoHash>().is_ok());
        assert!("short".parse::<InfoHash>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let info_hash = InfoHash::new([0xab; 20]);
        let json = serde_json::to_string(&info_hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: InfoHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info_hash);
    }

    #[test]
    fn test_invalid_input_is_user_error() {
        let err = TorrentError::InvalidInput {
            link: "nope".to_string(),
            reason: "unsupported".to_string(),
        };
        assert!(err.is_user_error());
        assert!(err.to_string().contains("link: nope"));

        let not_found = TorrentError::TorrentNotFound {
            info_hash: InfoHash::new([0; 20]),
        };
        assert!(!not_found.is_user_error());
    }
}
