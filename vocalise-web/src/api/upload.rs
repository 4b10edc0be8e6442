//! Upload stage: POST /api/upload-song, DELETE /api/session/:session_id

use std::path::Path as FsPath;

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Bytes collected from the head of an upload before content sniffing.
const SNIFF_BYTES: usize = 64;

/// POST /api/upload-song response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub filename: String,
    pub message: String,
}

/// POST /api/upload-song
///
/// Accepts one multipart `file` field, validates extension and sniffed
/// content, and streams the bytes to the upload directory. The session
/// is registered only after the file is fully persisted, so a failed
/// upload leaves no partial session behind.
pub async fn upload_song(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let extension = state.settings.upload_extension(&filename).ok_or_else(|| {
            ApiError::UnsupportedMedia(format!(
                "unsupported file type: {filename} (supported: {})",
                state.settings.allowed_extensions.join(", ")
            ))
        })?;

        // The stored file is named after the session id, so the id is
        // allocated up front; the session itself is registered last.
        let session_id = Uuid::new_v4();
        let path = state
            .settings
            .upload_dir
            .join(format!("{session_id}.{extension}"));

        if let Err(err) = persist_upload(&mut field, &path, state.settings.max_upload_bytes).await
        {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(err);
        }

        state
            .store
            .insert(session_id, path, filename.clone())
            .await;

        tracing::info!(session_id = %session_id, filename = %filename, "song uploaded");

        return Ok(Json(UploadResponse {
            success: true,
            session_id,
            filename,
            message: "upload complete".to_string(),
        }));
    }

    Err(ApiError::BadRequest(
        "missing multipart field 'file'".to_string(),
    ))
}

/// Stream an upload field to disk.
///
/// The size limit is enforced incrementally while the transfer is in
/// flight, and the first bytes are sniffed so a renamed non-audio file
/// is rejected regardless of extension.
async fn persist_upload(field: &mut Field<'_>, path: &FsPath, max_bytes: u64) -> ApiResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(ApiError::from_storage)?;

    let mut written: u64 = 0;
    let mut head: Vec<u8> = Vec::with_capacity(SNIFF_BYTES);
    let mut sniffed = false;

    while let Some(chunk) = field.chunk().await? {
        if !sniffed {
            let take = (SNIFF_BYTES - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
            if head.len() >= SNIFF_BYTES {
                check_audio_content(&head)?;
                sniffed = true;
            }
        }

        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "upload exceeds the {max_bytes} byte limit"
            )));
        }

        file.write_all(&chunk).await.map_err(ApiError::from_storage)?;
    }

    if !sniffed {
        // File shorter than the sniff window.
        check_audio_content(&head)?;
    }

    file.flush().await.map_err(ApiError::from_storage)?;
    Ok(())
}

/// Reject uploads whose content does not sniff as audio.
fn check_audio_content(head: &[u8]) -> ApiResult<()> {
    match infer::get(head) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Audio => Ok(()),
        Some(kind) => Err(ApiError::UnsupportedMedia(format!(
            "file content is {}, not audio",
            kind.mime_type()
        ))),
        None => Err(ApiError::UnsupportedMedia(
            "file content is not recognizable audio".to_string(),
        )),
    }
}

/// DELETE /api/session/:session_id
///
/// Explicit reset: drops the session and deletes its stored files.
/// Idempotent; removing an unknown session is a no-op success.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(handle) = state.store.remove(session_id).await {
        let song_path = handle.lock().await.song_path.clone();
        let _ = tokio::fs::remove_file(&song_path).await;
        remove_session_recordings(&state, session_id).await;
        tracing::info!(session_id = %session_id, "session removed");
    }

    Ok(Json(json!({
        "success": true,
        "message": "session removed",
    })))
}

/// Delete all recordings stored for a session.
async fn remove_session_recordings(state: &AppState, session_id: Uuid) {
    let prefix = format!("{session_id}_");
    let Ok(mut entries) = tokio::fs::read_dir(&state.settings.recording_dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(&prefix)
        {
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}

/// Build upload/reset routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload-song", post(upload_song))
        .route("/api/session/:session_id", delete(delete_session))
}
