//! Record/Score stage: section selection, recording scoring, history.

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use vocalise_core::{
    decode_file, AnalysisResult, FeedbackData, RecordingResult, ScoreError, SectionInfo,
};

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Recordings shorter than this are rejected outright.
const MIN_RECORDING_SECONDS: f64 = 0.5;
/// Recordings shorter than this fraction of the section are rejected.
const MIN_DURATION_RATIO: f64 = 0.1;

/// POST /api/analyze-recording response
#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub success: bool,
    pub analysis: AnalysisResult,
    pub feedback: FeedbackData,
    pub section: SectionInfo,
}

/// POST /api/select-section/:session_id/:section_id
///
/// Pure state transition: marks which section the next recording will
/// be scored against. Changing the selection drops any stored result.
pub async fn select_section(
    State(state): State<AppState>,
    Path((session_id, section_id)): Path<(Uuid, u32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let handle = state
        .store
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {session_id}")))?;

    let section = handle.lock().await.select_section(section_id)?;

    tracing::info!(session_id = %session_id, section_id, "section selected");

    Ok(Json(json!({
        "success": true,
        "section": section,
        "message": "ready to record",
    })))
}

/// POST /api/analyze-recording
///
/// Multipart fields: `recording` (audio blob), `session_id`, `section_id`.
/// The requested section must be the current selection. The reference
/// slice is cut from the stored song, scoring runs off the async
/// runtime, and the result is stored only if the selection is still the
/// one the recording was validated against.
pub async fn analyze_recording(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<RecordingResponse>> {
    let request = RecordingRequest::parse(multipart).await?;

    let handle = state
        .store
        .get(request.session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {}", request.session_id)))?;

    // Validate the state transition under the lock; keep only cheap
    // clones for the I/O-heavy part below.
    let (section, song_path) = {
        let session = handle.lock().await;
        let section = session.begin_recording(request.section_id)?;
        (section, session.song_path.clone())
    };

    let recording_path = state
        .settings
        .recording_dir
        .join(format!("{}_{}.wav", request.session_id, request.section_id));
    tokio::fs::write(&recording_path, &request.recording)
        .await
        .map_err(ApiError::from_storage)?;

    let scorer = state.scorer.clone();
    let feedback_engine = state.feedback;
    let score_section = section.clone();
    let (analysis, feedback) = tokio::task::spawn_blocking(
        move || -> Result<(AnalysisResult, FeedbackData), ApiError> {
            let recording = decode_file(&recording_path).map_err(|e| {
                ApiError::InvalidRecording(format!("could not decode recording: {e}"))
            })?;

            let duration = recording.duration();
            if duration < MIN_RECORDING_SECONDS
                || duration < score_section.duration * MIN_DURATION_RATIO
            {
                return Err(ApiError::InvalidRecording(format!(
                    "recording is {duration:.2}s, far shorter than the {:.1}s section",
                    score_section.duration
                )));
            }

            let song = decode_file(&song_path)
                .map_err(|e| ApiError::AnalysisFailed(format!("could not decode song: {e}")))?;
            let reference = song.slice(score_section.start_time, score_section.end_time);

            let voice = scorer.score(&reference, &recording).map_err(|e| match e {
                ScoreError::NoVoice => ApiError::InvalidRecording(e.to_string()),
            })?;
            let feedback = feedback_engine.generate(&voice, &score_section);
            Ok((voice.to_analysis(), feedback))
        },
    )
    .await
    .map_err(|e| ApiError::InvalidRecording(format!("scoring task failed: {e}")))??;

    let result = RecordingResult {
        analysis: analysis.clone(),
        feedback: feedback.clone(),
        section: SectionInfo {
            id: section.id,
            name: section.name.clone(),
        },
    };

    // Re-check the selection before storing: a concurrent SelectSection
    // since validation makes this result stale.
    handle.lock().await.store_result(result)?;

    tracing::info!(
        session_id = %request.session_id,
        section_id = request.section_id,
        overall_score = format!("{:.2}", analysis.overall_score),
        "recording scored"
    );

    Ok(Json(RecordingResponse {
        success: true,
        analysis,
        feedback,
        section: SectionInfo {
            id: section.id,
            name: section.name,
        },
    }))
}

/// Parsed multipart body of POST /api/analyze-recording.
struct RecordingRequest {
    recording: Vec<u8>,
    session_id: Uuid,
    section_id: u32,
}

impl RecordingRequest {
    async fn parse(mut multipart: Multipart) -> ApiResult<Self> {
        let mut recording = None;
        let mut session_id = None;
        let mut section_id = None;

        while let Some(field) = multipart.next_field().await? {
            match field.name() {
                Some("recording") => recording = Some(field.bytes().await?.to_vec()),
                Some("session_id") => {
                    let text = field.text().await?;
                    session_id = Some(text.parse::<Uuid>().map_err(|_| {
                        ApiError::BadRequest(format!("invalid session_id: {text}"))
                    })?);
                }
                Some("section_id") => {
                    let text = field.text().await?;
                    section_id = Some(text.parse::<u32>().map_err(|_| {
                        ApiError::BadRequest(format!("invalid section_id: {text}"))
                    })?);
                }
                _ => {}
            }
        }

        Ok(Self {
            recording: recording
                .ok_or_else(|| ApiError::BadRequest("missing field 'recording'".to_string()))?,
            session_id: session_id
                .ok_or_else(|| ApiError::BadRequest("missing field 'session_id'".to_string()))?,
            section_id: section_id
                .ok_or_else(|| ApiError::BadRequest("missing field 'section_id'".to_string()))?,
        })
    }
}

/// One stored recording, as listed by the history endpoint.
#[derive(Debug, Serialize)]
pub struct RecordingEntry {
    pub section_id: u32,
    pub filename: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// GET /api/recording-history/:session_id
///
/// Recordings stored on disk for the session, newest first.
pub async fn recording_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .store
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown session {session_id}")))?;

    let prefix = format!("{session_id}_");
    let mut recordings = Vec::new();

    if let Ok(mut entries) = tokio::fs::read_dir(&state.settings.recording_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let filename = entry.file_name().to_string_lossy().to_string();
            let Some(section_id) = parse_section_id(&filename, &prefix) else {
                continue;
            };
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            recordings.push(RecordingEntry {
                section_id,
                filename,
                file_size: metadata.len(),
                created_at,
            });
        }
    }

    recordings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(json!({
        "success": true,
        "recordings": recordings,
    })))
}

/// Extract the section id from a `{session_id}_{section_id}.wav` name.
fn parse_section_id(filename: &str, prefix: &str) -> Option<u32> {
    filename
        .strip_prefix(prefix)?
        .strip_suffix(".wav")?
        .parse()
        .ok()
}

/// Build recording routes
pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/select-section/:session_id/:section_id",
            post(select_section),
        )
        .route("/api/analyze-recording", post(analyze_recording))
        .route("/api/recording-history/:session_id", get(recording_history))
}
