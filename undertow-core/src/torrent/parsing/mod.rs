//! Link parsing: turns a user-supplied locator into an info hash and magnet URI
//!
//! Accepted locators:
//! - magnet URIs with a `urn:btih` topic
//! - bare info hashes (40 hex or 32 base32 characters)
//! - `http(s)` URLs pointing at a `.torrent` file

pub mod magnet;
pub mod metainfo;

use std::time::Duration;

use bytes::BytesMut;

pub use magnet::{MagnetLink, parse_magnet_uri, to_magnet_uri};
pub use metainfo::{Metainfo, parse_metainfo};

use super::{InfoHash, TorrentError};
use crate::config::ResolverConfig;

/// Low-level parse failure; wrapped into `TorrentError::InvalidInput` at the
/// registry boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Result of resolving a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub info_hash: InfoHash,
    pub name: Option<String>,
    pub trackers: Vec<String>,
    /// Normalized magnet URI handed to the engine.
    pub magnet_uri: String,
}

impl ParsedLink {
    fn new(info_hash: InfoHash, name: Option<String>, trackers: Vec<String>) -> Self {
        let magnet_uri = to_magnet_uri(info_hash, name.as_deref(), &trackers);
        Self {
            info_hash,
            name,
            trackers,
            magnet_uri,
        }
    }
}

/// Resolves links to torrent identity, fetching remote `.torrent` files when
/// needed.
#[derive(Debug, Clone)]
pub struct LinkParser {
    client: reqwest::Client,
    max_metainfo_bytes: usize,
}

impl LinkParser {
    /// Creates a parser whose HTTP client honours the resolver settings.
    ///
    /// # Errors
    /// - `reqwest::Error` - HTTP client could not be built
    pub fn new(config: &ResolverConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_metainfo_bytes: config.max_metainfo_bytes,
        })
    }

    /// Resolves `link` to an info hash and normalized magnet URI.
    ///
    /// # Errors
    /// - `TorrentError::InvalidInput` - Link is malformed, unreachable or not a torrent
    pub async fn parse(&self, link: &str) -> Result<ParsedLink, TorrentError> {
        let trimmed = link.trim();

        let result = if trimmed.starts_with("magnet:") {
            parse_magnet_uri(trimmed).map(|m| ParsedLink::new(m.info_hash, m.name, m.trackers))
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            self.fetch_metainfo(trimmed)
                .await
                .map(|m| ParsedLink::new(m.info_hash, Some(m.name), m.trackers))
        } else if let Ok(info_hash) = trimmed.parse::<InfoHash>() {
            Ok(ParsedLink::new(info_hash, None, Vec::new()))
        } else {
            Err(ParseError::new("unsupported link format"))
        };

        result.map_err(|e| TorrentError::InvalidInput {
            link: link.to_string(),
            reason: e.reason,
        })
    }

    async fn fetch_metainfo(&self, url: &str) -> Result<Metainfo, ParseError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ParseError::new(format!("Failed to fetch torrent: {e}")))?;

        let too_large = || {
            ParseError::new(format!(
                "Torrent file too large: more than {} bytes",
                self.max_metainfo_bytes
            ))
        };

        if response
            .content_length()
            .is_some_and(|length| length > self.max_metainfo_bytes as u64)
        {
            return Err(too_large());
        }

        // Length-less and chunked bodies are cut off as soon as they pass the limit.
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ParseError::new(format!("Failed to read torrent: {e}")))?
        {
            if body.len() + chunk.len() > self.max_metainfo_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, bytes = body.len(), "Fetched remote torrent file");
        parse_metainfo(&body)
    }
}

impl Default for LinkParser {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_metainfo_bytes: ResolverConfig::default().max_metainfo_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use sha1::Digest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    /// Serves one canned HTTP response and returns the URL to fetch.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/file.torrent")
    }

    #[tokio::test]
    async fn test_parse_magnet_normalizes_uri() {
        let parser = LinkParser::default();
        let link = format!("magnet:?xt=urn:btih:{}&dn=Movie", HEX.to_uppercase());

        let parsed = parser.parse(&link).await.unwrap();
        assert_eq!(parsed.info_hash.to_hex(), HEX);
        assert_eq!(parsed.name.as_deref(), Some("Movie"));
        assert_eq!(parsed.magnet_uri, format!("magnet:?xt=urn:btih:{HEX}&dn=Movie"));
    }

    #[tokio::test]
    async fn test_parse_bare_hashes() {
        let parser = LinkParser::default();

        let hex = parser.parse(HEX).await.unwrap();
        assert_eq!(hex.magnet_uri, format!("magnet:?xt=urn:btih:{HEX}"));

        let base32 = parser
            .parse("AEBAGBAFAYDQQCIKBMGA2DQPCAIREEYU")
            .await
            .unwrap();
        assert_eq!(base32.info_hash.to_hex(), "0102030405060708090a0b0c0d0e0f1011121314");
    }

    #[tokio::test]
    async fn test_unparsable_link_is_invalid_input() {
        let parser = LinkParser::default();
        let err = parser.parse("definitely not a torrent").await.unwrap_err();

        match err {
            TorrentError::InvalidInput { link, .. } => assert_eq!(link, "definitely not a torrent"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetches_remote_torrent_file() {
        let info = b"d6:lengthi10e4:name9:movie.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaae";
        let mut body = b"d8:announce13:udp://t.io:804:info".to_vec();
        body.extend_from_slice(info);
        body.push(b'e');
        let url = serve_once("200 OK", body).await;

        let parsed = LinkParser::default().parse(&url).await.unwrap();

        let expected: [u8; 20] = sha1::Sha1::digest(info).into();
        assert_eq!(parsed.info_hash, InfoHash::new(expected));
        assert_eq!(parsed.name.as_deref(), Some("movie.mkv"));
        assert_eq!(parsed.trackers, vec!["udp://t.io:80"]);
        assert!(parsed.magnet_uri.contains("&dn=movie.mkv&tr=udp%3A%2F%2Ft.io%3A80"));
    }

    #[tokio::test]
    async fn test_remote_failure_is_invalid_input() {
        let url = serve_once("404 Not Found", b"missing".to_vec()).await;
        let err = LinkParser::default().parse(&url).await.unwrap_err();
        assert!(err.is_user_error());
    }

    /// Streams `chunks` chunks of `chunk_len` bytes without a `Content-Length`,
    /// pausing between chunks.
    async fn serve_chunked(chunks: usize, chunk_len: usize, pause: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for _ in 0..chunks {
                let mut frame = format!("{chunk_len:X}\r\n").into_bytes();
                frame.extend(std::iter::repeat_n(b'x', chunk_len));
                frame.extend_from_slice(b"\r\n");
                // The client hangs up once it has seen enough.
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
                tokio::time::sleep(pause).await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });

        format!("http://{addr}/file.torrent")
    }

    #[tokio::test]
    async fn test_chunked_oversized_file_is_cut_off_early() {
        let url = serve_chunked(40, 1024, Duration::from_millis(50)).await;
        let parser = LinkParser::new(&ResolverConfig {
            max_metainfo_bytes: 16,
            ..ResolverConfig::default()
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = parser.parse(&url).await.unwrap_err();

        assert!(err.to_string().contains("too large"));
        assert!(
            started.elapsed() < Duration::from_millis(1000),
            "rejected only after {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_chunked_file_within_limit_reaches_decoder() {
        let url = serve_chunked(2, 8, Duration::ZERO).await;
        let parser = LinkParser::new(&ResolverConfig {
            max_metainfo_bytes: 16,
            ..ResolverConfig::default()
        })
        .unwrap();

        // Reaches the bencode decoder rather than the size check.
        let err = parser.parse(&url).await.unwrap_err();
        assert!(err.to_string().contains("Invalid torrent file"));
    }

    #[tokio::test]
    async fn test_oversized_remote_file_is_rejected() {
        let url = serve_once("200 OK", vec![b'x'; 64]).await;
        let parser = LinkParser::new(&ResolverConfig {
            max_metainfo_bytes: 16,
            ..ResolverConfig::default()
        })
        .unwrap();

        let err = parser.parse(&url).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
