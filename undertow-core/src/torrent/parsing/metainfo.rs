//! `.torrent` metainfo decoding
//!
//! Only the fields needed to build a magnet URI are extracted. The info hash
//! is the SHA-1 of the bencoded `info` dictionary; `serde_bencode` writes
//! dictionary keys in sorted order, so re-encoding the decoded value yields
//! the canonical bytes.

use serde::Deserialize;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};

use super::ParseError;
use crate::torrent::InfoHash;

#[derive(Debug, Deserialize)]
struct RawMetainfo {
    #[serde(default)]
    announce: Option<String>,
    #[serde(default, rename = "announce-list")]
    announce_list: Option<Vec<Vec<String>>>,
    info: Value,
}

#[derive(Debug, Deserialize)]
struct InfoName {
    name: String,
}

/// Identity and tracker hints decoded from a `.torrent` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    pub info_hash: InfoHash,
    pub name: String,
    pub trackers: Vec<String>,
}

/// Decodes bencoded `.torrent` bytes.
///
/// Trackers come from `announce` followed by every tier of `announce-list`,
/// first occurrence wins.
///
/// # Errors
/// - `ParseError` - Malformed bencode, missing `info` or missing `name`
pub fn parse_metainfo(data: &[u8]) -> Result<Metainfo, ParseError> {
    let raw: RawMetainfo = serde_bencode::from_bytes(data)
        .map_err(|e| ParseError::new(format!("Invalid torrent file: {e}")))?;

    if !matches!(raw.info, Value::Dict(_)) {
        return Err(ParseError::new("Invalid torrent file: info is not a dictionary"));
    }

    let info_bytes = serde_bencode::to_bytes(&raw.info)
        .map_err(|e| ParseError::new(format!("Cannot encode info dictionary: {e}")))?;
    let InfoName { name } = serde_bencode::from_bytes(&info_bytes)
        .map_err(|e| ParseError::new(format!("Invalid torrent file: {e}")))?;

    let digest: [u8; 20] = Sha1::digest(&info_bytes).into();

    let mut trackers: Vec<String> = Vec::new();
    let tiers = raw.announce_list.unwrap_or_default();
    for tracker in raw.announce.into_iter().chain(tiers.into_iter().flatten()) {
        if !tracker.is_empty() && !trackers.contains(&tracker) {
            trackers.push(tracker);
        }
    }

    Ok(Metainfo {
        info_hash: InfoHash::new(digest),
        name,
        trackers,
    })
}
