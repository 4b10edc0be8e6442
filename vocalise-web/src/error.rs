//! Error types for vocalise-web.
//!
//! Every failure in the pipeline maps to a structured JSON response of
//! the shape `{success: false, error, detail}` with a status matching
//! its category. Nothing here is fatal to the server process.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown session or section (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Upload exceeds the configured size limit (413)
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload is not a supported audio format (415)
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Out-of-order request for the session's state machine (409)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Song could not be decoded or segmented (422)
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// Recording unusable for scoring (422)
    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// Storage capacity unavailable (503)
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Malformed request (400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// IO error (500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error (500)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Wrap an IO error from a storage write, surfacing a full disk as
    /// `ResourceExhausted` rather than an opaque internal error.
    pub fn from_storage(err: std::io::Error) -> Self {
        // 28 == ENOSPC
        if err.raw_os_error() == Some(28) {
            ApiError::ResourceExhausted(format!("storage full: {err}"))
        } else {
            ApiError::Io(err)
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::UnsupportedMedia(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media")
            }
            ApiError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            ApiError::AnalysisFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, "analysis_failed"),
            ApiError::InvalidRecording(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_recording")
            }
            ApiError::ResourceExhausted(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "resource_exhausted")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Io(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = self.to_string();

        let body = Json(json!({
            "success": false,
            "error": code,
            "detail": detail,
        }));

        (status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotAnalyzed => ApiError::InvalidState(err.to_string()),
            SessionError::UnknownSection(_) => ApiError::NotFound(err.to_string()),
            SessionError::NotSelected { .. } => ApiError::InvalidState(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("malformed multipart body: {err}"))
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_taxonomy() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApiError::PayloadTooLarge("x".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ApiError::UnsupportedMedia("x".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (ApiError::InvalidState("x".into()), StatusCode::CONFLICT),
            (
                ApiError::AnalysisFailed("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::InvalidRecording("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::ResourceExhausted("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected);
        }
    }

    #[test]
    fn enospc_maps_to_resource_exhausted() {
        let err = std::io::Error::from_raw_os_error(28);
        assert!(matches!(
            ApiError::from_storage(err),
            ApiError::ResourceExhausted(_)
        ));

        let err = std::io::Error::from_raw_os_error(13);
        assert!(matches!(ApiError::from_storage(err), ApiError::Io(_)));
    }
}
