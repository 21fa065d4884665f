//! Magnet link parsing and construction

use url::Url;

use super::ParseError;
use crate::torrent::InfoHash;

const BTIH_PREFIX: &str = "urn:btih:";

/// Magnet link components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub name: Option<String>,
    pub trackers: Vec<String>,
}

/// Parses a magnet URI into its info hash, display name and trackers.
///
/// The `xt` topic may carry the hash as 40 hex or 32 base32 characters.
/// Display name and tracker values are percent-decoded.
///
/// # Errors
/// - `ParseError` - Not a magnet URI or no usable `urn:btih` topic
pub fn parse_magnet_uri(uri: &str) -> Result<MagnetLink, ParseError> {
    magnet_url::Magnet::new(uri)
        .map_err(|e| ParseError::new(format!("Invalid magnet link: {e}")))?;

    let url = Url::parse(uri).map_err(|e| ParseError::new(format!("Invalid magnet link: {e}")))?;

    let mut info_hash = None;
    let mut name = None;
    let mut trackers = Vec::new();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "xt" if info_hash.is_none() => {
                if let Some(hash) = value.strip_prefix(BTIH_PREFIX) {
                    info_hash = Some(hash.parse::<InfoHash>().map_err(|e| {
                        ParseError::new(format!("Invalid info hash in magnet link: {e}"))
                    })?);
                }
            }
            "dn" if name.is_none() && !value.is_empty() => name = Some(value.into_owned()),
            "tr" if !value.is_empty() => trackers.push(value.into_owned()),
            _ => {}
        }
    }

    let info_hash = info_hash.ok_or_else(|| {
        ParseError::new(format!("Missing urn:btih info hash in magnet link: {uri}"))
    })?;

    Ok(MagnetLink {
        info_hash,
        name,
        trackers,
    })
}

/// Builds a normalized magnet URI: lowercase hex topic, then `dn`, then one
/// `tr` per tracker.
pub fn to_magnet_uri(info_hash: InfoHash, name: Option<&str>, trackers: &[String]) -> String {
    let mut uri = format!("magnet:?xt={BTIH_PREFIX}{}", info_hash.to_hex());
    if let Some(name) = name {
        uri.push_str("&dn=");
        uri.push_str(&urlencoding::encode(name));
    }
    for tracker in trackers {
        uri.push_str("&tr=");
        uri.push_str(&urlencoding::encode(tracker));
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_full_magnet() {
        let uri = format!(
            "magnet:?xt=urn:btih:{HEX}&dn=Test%20Torrent&tr=http%3A%2F%2Ftracker.example.com%2Fannounce&tr=udp%3A%2F%2Fbackup.example.com%3A1337"
        );
        let magnet = parse_magnet_uri(&uri).unwrap();

        assert_eq!(magnet.info_hash.to_hex(), HEX);
        assert_eq!(magnet.name.as_deref(), Some("Test Torrent"));
        assert_eq!(
            magnet.trackers,
            vec![
                "http://tracker.example.com/announce",
                "udp://backup.example.com:1337"
            ]
        );
    }

    #[test]
    fn test_uppercase_hash_is_normalized() {
        let uri = format!("magnet:?xt=urn:btih:{}", HEX.to_uppercase());
        let magnet = parse_magnet_uri(&uri).unwrap();
        assert_eq!(magnet.info_hash.to_hex(), HEX);
        assert_eq!(magnet.name, None);
        assert!(magnet.trackers.is_empty());
    }

    #[test]
    fn test_rejects_non_magnet() {
        assert!(parse_magnet_uri("invalid://not-a-magnet").is_err());
    }

    #[test]
    fn test_rejects_missing_topic() {
        assert!(parse_magnet_uri("magnet:?dn=nothing").is_err());
        assert!(parse_magnet_uri("magnet:?xt=urn:sha1:abc&dn=nothing").is_err());
    }

    #[test]
    fn test_rejects_short_hash() {
        assert!(parse_magnet_uri("magnet:?xt=urn:btih:abcd&dn=x").is_err());
    }

    #[test]
    fn test_to_magnet_uri_round_trips_through_parser() {
        let info_hash = InfoHash::from_hex(HEX).unwrap();
        let trackers = vec!["udp://tracker.example.com:80/announce".to_string()];
        let uri = to_magnet_uri(info_hash, Some("My Movie (2024)"), &trackers);

        assert!(uri.starts_with(&format!("magnet:?xt=urn:btih:{HEX}&dn=My%20Movie")));

        let parsed = parse_magnet_uri(&uri).unwrap();
        assert_eq!(parsed.info_hash, info_hash);
        assert_eq!(parsed.name.as_deref(), Some("My Movie (2024)"));
        assert_eq!(parsed.trackers, trackers);
    }
}
