//! File streaming with single byte-range support
//!
//! The body is produced lazily in fixed-size chunks read from the engine, so
//! large files never sit in memory.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use futures::stream;
use serde::Deserialize;
use undertow_core::{EngineError, FileCriteria, TorrentRecord};

use super::api::{lookup, no_matching_file};
use super::error::ApiError;
use super::range::{ByteRange, extract_range_header, parse_range_header};
use crate::server::AppState;

/// Bytes requested from the engine per body chunk.
pub const STREAM_CHUNK_SIZE: u64 = 256 * 1024;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Query for `GET /stream?link=...`.
///
/// Criteria fields are spelled out rather than flattened so that
/// `fileIndex` still parses as a number from the query string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamLinkQuery {
    pub link: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub file_index: Option<usize>,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl StreamLinkQuery {
    fn criteria(&self) -> FileCriteria {
        FileCriteria {
            file: self.file.clone(),
            file_index: self.file_index,
            file_type: self.file_type.clone(),
        }
    }
}

/// `GET /stream/{info_hash}?file=&fileIndex=&fileType=`
///
/// # Errors
/// - `400` - Malformed info hash
/// - `404` - Torrent not tracked or no file matches
/// - `416` - Range outside the file
pub async fn stream_by_hash(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(criteria): Query<FileCriteria>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let record = lookup(&state, &info_hash)?;
    stream_file(record, &criteria, &headers)
}

/// `GET /stream?link=...&file=&fileIndex=&fileType=`
///
/// Adds (or refreshes) the torrent before streaming.
///
/// # Errors
/// - `400` - Link could not be resolved
/// - `404` - No file matches
/// - `416` - Range outside the file
/// - `502` - Engine failed to open the torrent
pub async fn stream_by_link(
    State(state): State<AppState>,
    Query(query): Query<StreamLinkQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let record = state.registry.add_torrent(&query.link).await?;
    stream_file(record, &query.criteria(), &headers)
}

fn stream_file(
    record: TorrentRecord,
    criteria: &FileCriteria,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let (file_index, file) = record
        .find_file(criteria)
        .ok_or_else(|| no_matching_file(&record))?;
    let total_size = file.length;
    let content_type = if file.file_type.is_empty() {
        FALLBACK_CONTENT_TYPE.to_string()
    } else {
        file.file_type.clone()
    };

    let requested = match extract_range_header(headers) {
        Some(value) => parse_range_header(value, total_size)?,
        None => None,
    };

    let mut response = Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(ACCEPT_RANGES, "bytes")
        .header(CACHE_CONTROL, "no-cache");

    let range = match requested {
        Some(range) => {
            response = response
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_RANGE, range.content_range(total_size));
            Some(range)
        }
        None => {
            response = response.status(StatusCode::OK);
            ByteRange::full(total_size)
        }
    };

    let length = range.map_or(0, |r| r.len());
    tracing::debug!(
        info_hash = %record.info_hash,
        file = %file.path,
        ?range,
        "Streaming file"
    );

    let body = match range {
        Some(range) => chunked_body(record, file_index, range),
        None => Body::empty(),
    };

    response
        .header(CONTENT_LENGTH, length)
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {e}")))
}

fn chunked_body(record: TorrentRecord, file_index: usize, range: ByteRange) -> Body {
    let chunks = stream::try_unfold(range.start, move |offset| {
        let record = record.clone();
        async move {
            if offset > range.end {
                return Ok(None);
            }
            let want = (range.end - offset + 1).min(STREAM_CHUNK_SIZE);
            let chunk = record.read(file_index, offset, want).await?;
            if chunk.is_empty() {
                return Ok(None);
            }
            let next = offset + chunk.len() as u64;
            Ok::<_, EngineError>(Some((chunk, next)))
        }
    });

    Body::from_stream(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_query_maps_to_criteria() {
        let query: StreamLinkQuery = serde_json::from_str(
            r#"{"link":"magnet:?xt=urn:btih:abc","fileIndex":2,"fileType":"video"}"#,
        )
        .unwrap();
        let criteria = query.criteria();
        assert_eq!(criteria.file_index, Some(2));
        assert_eq!(criteria.file_type.as_deref(), Some("video"));
        assert_eq!(criteria.file, None);
    }
}
