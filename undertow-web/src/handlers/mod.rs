//! HTTP request handlers organized by functionality

pub mod api;
pub mod error;
pub mod range;
pub mod streaming;

pub use api::{
    AddTorrentRequest, FileDto, HealthResponse, TorrentDto, add_torrent, delete_torrent,
    get_torrent, health, list_torrents, resolve_file,
};
pub use error::ApiError;
pub use streaming::{StreamLinkQuery, stream_by_hash, stream_by_link};
