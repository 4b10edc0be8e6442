//! Analyze stage: POST /api/analyze-song/:session_id plus section queries.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use vocalise_core::{decode_file, Section};

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// POST /api/analyze-song response
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub sections: Vec<Section>,
    pub message: String,
}

/// POST /api/analyze-song/:session_id
///
/// Decodes the stored song and segments it into practice sections.
/// Re-analysis is allowed and replaces the section list, which also
/// clears any selection and stored result referencing the old list.
/// Decode and segmentation run off the async runtime; any failure or
/// panic inside them is reported as `analysis_failed`, never raw.
pub async fn analyze_song(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisResponse>> {
    let handle = state
        .store
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {session_id}")))?;

    // The song file is write-once, so only the path is read under the
    // lock; decoding happens with the session unlocked.
    let song_path = handle.lock().await.song_path.clone();

    let segmenter = state.segmenter.clone();
    let sections = tokio::task::spawn_blocking(move || -> Result<Vec<Section>, ApiError> {
        let song = decode_file(&song_path)
            .map_err(|e| ApiError::AnalysisFailed(format!("could not decode song: {e}")))?;
        segmenter
            .segment(&song)
            .map_err(|e| ApiError::AnalysisFailed(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::AnalysisFailed(format!("analysis task failed: {e}")))??;

    {
        let mut session = handle.lock().await;
        session.set_sections(sections.clone());
    }

    tracing::info!(
        session_id = %session_id,
        sections = sections.len(),
        "song analyzed"
    );

    let message = format!("{} practice sections ready", sections.len());
    Ok(Json(AnalysisResponse {
        success: true,
        sections,
        message,
    }))
}

/// GET /api/sections/:session_id
///
/// Current section list for a session (empty before Analyze).
pub async fn get_sections(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let handle = state
        .store
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {session_id}")))?;
    let sections = handle.lock().await.sections.clone();

    Ok(Json(json!({
        "success": true,
        "sections": sections,
    })))
}

/// GET /api/section/:session_id/:section_id
pub async fn get_section_detail(
    State(state): State<AppState>,
    Path((session_id, section_id)): Path<(Uuid, u32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let handle = state
        .store
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {session_id}")))?;
    let section = handle
        .lock()
        .await
        .section(section_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("unknown section id {section_id}")))?;

    Ok(Json(json!({
        "success": true,
        "section": section,
    })))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze-song/:session_id", post(analyze_song))
        .route("/api/sections/:session_id", get(get_sections))
        .route("/api/section/:session_id/:section_id", get(get_section_detail))
}
