//! JSON error responses

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::CONTENT_RANGE;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use undertow_core::TorrentError;

use super::range::RangeNotSatisfiable;

/// Error returned by any handler, rendered as `{ "error": "..." }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    #[error(transparent)]
    RangeNotSatisfiable(#[from] RangeNotSatisfiable),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TorrentError> for ApiError {
    fn from(error: TorrentError) -> Self {
        match error {
            TorrentError::InvalidInput { .. } => ApiError::BadRequest(error.to_string()),
            TorrentError::TorrentNotFound { .. } => ApiError::NotFound(error.to_string()),
            TorrentError::Engine(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Request failed");
        } else {
            tracing::debug!(%status, error = %self, "Request rejected");
        }

        let body = Json(json!({ "error": self.to_string() }));
        match self {
            ApiError::RangeNotSatisfiable(e) => (
                status,
                [(CONTENT_RANGE, format!("bytes */{}", e.total_size))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use undertow_core::{EngineError, InfoHash};

    use super::*;

    #[test]
    fn test_torrent_errors_map_to_status() {
        let invalid = ApiError::from(TorrentError::InvalidInput {
            link: "x".to_string(),
            reason: "unsupported link format".to_string(),
        });
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let missing = ApiError::from(TorrentError::TorrentNotFound {
            info_hash: InfoHash::new([0; 20]),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let engine = ApiError::from(TorrentError::Engine(EngineError::ReadFailed {
            reason: "gone".to_string(),
        }));
        assert_eq!(engine.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_unsatisfiable_range_sets_content_range() {
        let response = ApiError::from(RangeNotSatisfiable { total_size: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */42");
    }
}
