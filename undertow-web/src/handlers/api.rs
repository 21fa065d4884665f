//! JSON API handlers for torrent management

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use undertow_core::{FileCriteria, FileRecord, InfoHash, TorrentError, TorrentRecord};

use super::error::ApiError;
use crate::server::AppState;

/// Torrent as exposed over the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentDto {
    pub info_hash: InfoHash,
    pub name: String,
    pub length: u64,
    pub link: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub files: Vec<FileRecord>,
}

impl From<TorrentRecord> for TorrentDto {
    fn from(record: TorrentRecord) -> Self {
        Self {
            info_hash: record.info_hash,
            name: record.name,
            length: record.length,
            link: record.link,
            created: record.created,
            updated: record.updated,
            files: record.files,
        }
    }
}

/// File chosen by the resolver, with its 1-based position.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub file_index: usize,
    #[serde(flatten)]
    pub file: FileRecord,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub torrents: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddTorrentRequest {
    pub link: String,
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        torrents: state.registry.len(),
    })
}

/// `GET /api/torrents`
pub async fn list_torrents(State(state): State<AppState>) -> Json<Vec<TorrentDto>> {
    Json(
        state
            .registry
            .get_torrents()
            .into_iter()
            .map(TorrentDto::from)
            .collect(),
    )
}

/// `POST /api/torrents`
///
/// # Errors
/// - `400` - Link could not be resolved
/// - `502` - Engine failed to open the torrent
pub async fn add_torrent(
    State(state): State<AppState>,
    Json(request): Json<AddTorrentRequest>,
) -> Result<Json<TorrentDto>, ApiError> {
    let record = state.registry.add_torrent(&request.link).await?;
    Ok(Json(record.into()))
}

/// `GET /api/torrents/{info_hash}`
///
/// # Errors
/// - `400` - Malformed info hash
/// - `404` - Torrent not tracked
pub async fn get_torrent(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
) -> Result<Json<TorrentDto>, ApiError> {
    let record = lookup(&state, &info_hash)?;
    Ok(Json(record.into()))
}

/// `DELETE /api/torrents/{info_hash}`
///
/// # Errors
/// - `400` - Malformed info hash
/// - `404` - Torrent not tracked
/// - `502` - Engine teardown failed; the torrent stays tracked
pub async fn delete_torrent(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    let info_hash = parse_info_hash(&info_hash)?;
    if state.registry.remove_torrent(info_hash).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TorrentError::TorrentNotFound { info_hash }.into())
    }
}

/// `GET /api/torrents/{info_hash}/file?file=&fileIndex=&fileType=`
///
/// # Errors
/// - `400` - Malformed info hash
/// - `404` - Torrent not tracked or no file matches
pub async fn resolve_file(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(criteria): Query<FileCriteria>,
) -> Result<Json<FileDto>, ApiError> {
    let record = lookup(&state, &info_hash)?;
    let (index, file) = record
        .find_file(&criteria)
        .ok_or_else(|| no_matching_file(&record))?;

    Ok(Json(FileDto {
        file_index: index + 1,
        file: file.clone(),
    }))
}

pub(crate) fn parse_info_hash(raw: &str) -> Result<InfoHash, ApiError> {
    raw.parse::<InfoHash>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub(crate) fn lookup(state: &AppState, raw: &str) -> Result<TorrentRecord, ApiError> {
    let info_hash = parse_info_hash(raw)?;
    state
        .registry
        .get_torrent(info_hash)
        .ok_or_else(|| TorrentError::TorrentNotFound { info_hash }.into())
}

pub(crate) fn no_matching_file(record: &TorrentRecord) -> ApiError {
    ApiError::NotFound(format!("No matching file in torrent {}", record.info_hash))
}
