//! Session state machine and store.
//!
//! One `Session` tracks a user's upload-through-recording workflow:
//! `Uploaded -> Analyzed -> SectionSelected -> Scored`, with Analyze,
//! SelectSection and Record each re-enterable. The invariants
//! (selection references a current section; a stored result matches
//! the selection) are enforced here, not in the handlers.
//!
//! The store is process-lifetime only: sessions survive until an
//! explicit reset or server restart. There is no TTL eviction, so a
//! long-running deployment grows without bound; that risk is accepted
//! and documented rather than silently handled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;
use vocalise_core::{RecordingResult, Section};

/// State-machine violations surfaced to the API layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// SelectSection/Record before Analyze.
    #[error("song has not been analyzed yet")]
    NotAnalyzed,

    /// Section id missing from the current section list.
    #[error("unknown section id {0}")]
    UnknownSection(u32),

    /// Record against a section that is not the current selection.
    #[error("section {requested} is not the selected section")]
    NotSelected { requested: u32 },
}

/// Server-side state for one user's practice workflow.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    /// Original upload filename, for display.
    pub filename: String,
    /// Stored song file; write-once after upload.
    pub song_path: PathBuf,
    /// Practice sections, empty until Analyze runs.
    pub sections: Vec<Section>,
    pub selected_section_id: Option<u32>,
    /// At most one current result per session.
    pub last_result: Option<RecordingResult>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: Uuid, song_path: PathBuf, filename: String) -> Self {
        Self {
            id,
            filename,
            song_path,
            sections: Vec::new(),
            selected_section_id: None,
            last_result: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_analyzed(&self) -> bool {
        !self.sections.is_empty()
    }

    pub fn section(&self, section_id: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Replace the section list (Analyze / re-Analyze).
    ///
    /// Invalidates the selection and the stored result: both referenced
    /// the old list, and leaving them dangling would break the session
    /// invariants.
    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.selected_section_id = None;
        self.last_result = None;
    }

    /// Select a section for recording.
    ///
    /// Changing the selection clears `last_result`; the old result was
    /// scored against a different section.
    pub fn select_section(&mut self, section_id: u32) -> Result<Section, SessionError> {
        if !self.is_analyzed() {
            return Err(SessionError::NotAnalyzed);
        }
        let section = self
            .section(section_id)
            .cloned()
            .ok_or(SessionError::UnknownSection(section_id))?;
        if self.selected_section_id != Some(section_id) {
            self.last_result = None;
        }
        self.selected_section_id = Some(section_id);
        Ok(section)
    }

    /// Validate a Record request against the current selection and hand
    /// back the section to score against.
    pub fn begin_recording(&self, section_id: u32) -> Result<Section, SessionError> {
        if !self.is_analyzed() {
            return Err(SessionError::NotAnalyzed);
        }
        let section = self
            .section(section_id)
            .cloned()
            .ok_or(SessionError::UnknownSection(section_id))?;
        if self.selected_section_id != Some(section_id) {
            return Err(SessionError::NotSelected {
                requested: section_id,
            });
        }
        Ok(section)
    }

    /// Store a scored result, re-checking the selection it was produced
    /// for. A concurrent SelectSection between scoring and storing makes
    /// the result stale; reject it rather than storing a mismatch.
    pub fn store_result(&mut self, result: RecordingResult) -> Result<(), SessionError> {
        if self.selected_section_id != Some(result.section.id) {
            return Err(SessionError::NotSelected {
                requested: result.section.id,
            });
        }
        self.last_result = Some(result);
        Ok(())
    }
}

/// Process-wide session registry.
///
/// The outer `RwLock` guards only the registry map and is held briefly;
/// the per-session `Mutex` serializes all mutations of one session while
/// leaving other sessions free to proceed. File I/O happens outside
/// both locks.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly uploaded session and return its id.
    pub async fn create(&self, song_path: PathBuf, filename: String) -> Uuid {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(id, song_path, filename)));
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Register a session under a pre-allocated id (the upload handler
    /// names the stored file after the id before registering).
    pub async fn insert(&self, id: Uuid, song_path: PathBuf, filename: String) {
        let session = Arc::new(Mutex::new(Session::new(id, song_path, filename)));
        self.sessions.write().await.insert(id, session);
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Remove a session (explicit reset). The caller is responsible for
    /// deleting the session's files afterwards.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocalise_core::{
        AnalysisResult, Difficulty, FeedbackData, ScoreData, SectionInfo,
    };

    fn sections(count: u32) -> Vec<Section> {
        (0..count)
            .map(|i| Section {
                id: i,
                name: format!("Section {} ({}.0s-{}.0s)", i + 1, i * 8, (i + 1) * 8),
                start_time: (i * 8) as f64,
                end_time: ((i + 1) * 8) as f64,
                duration: 8.0,
                difficulty: Difficulty::Medium,
            })
            .collect()
    }

    fn result_for(section: &Section) -> RecordingResult {
        RecordingResult {
            analysis: AnalysisResult {
                scores: ScoreData {
                    pitch: Some(0.8),
                    ..Default::default()
                },
                overall_score: 0.8,
            },
            feedback: FeedbackData::default(),
            section: SectionInfo {
                id: section.id,
                name: section.name.clone(),
            },
        }
    }

    fn uploaded_session() -> Session {
        Session::new(Uuid::new_v4(), PathBuf::from("/tmp/song.wav"), "song.wav".into())
    }

    #[test]
    fn select_before_analyze_is_rejected() {
        let mut session = uploaded_session();
        assert_eq!(
            session.select_section(0).unwrap_err(),
            SessionError::NotAnalyzed
        );
        assert_eq!(
            session.begin_recording(0).unwrap_err(),
            SessionError::NotAnalyzed
        );
    }

    #[test]
    fn select_unknown_section_is_not_found() {
        let mut session = uploaded_session();
        session.set_sections(sections(2));
        assert_eq!(
            session.select_section(7).unwrap_err(),
            SessionError::UnknownSection(7)
        );
        // Invariant holds: nothing was selected.
        assert_eq!(session.selected_section_id, None);
    }

    #[test]
    fn record_requires_matching_selection() {
        let mut session = uploaded_session();
        session.set_sections(sections(3));
        session.select_section(1).unwrap();

        assert!(session.begin_recording(1).is_ok());
        assert_eq!(
            session.begin_recording(2).unwrap_err(),
            SessionError::NotSelected { requested: 2 }
        );
    }

    #[test]
    fn reanalyze_cascades_to_selection_and_result() {
        let mut session = uploaded_session();
        session.set_sections(sections(3));
        let section = session.select_section(1).unwrap();
        session.store_result(result_for(&section)).unwrap();
        assert!(session.last_result.is_some());

        session.set_sections(sections(2));
        assert_eq!(session.selected_section_id, None);
        assert!(session.last_result.is_none());
    }

    #[test]
    fn changing_selection_invalidates_result() {
        let mut session = uploaded_session();
        session.set_sections(sections(3));
        let section = session.select_section(1).unwrap();
        session.store_result(result_for(&section)).unwrap();

        session.select_section(2).unwrap();
        assert!(session.last_result.is_none());

        // Re-selecting the same section keeps the (re-scored) result.
        let section = session.section(2).cloned().unwrap();
        session.store_result(result_for(&section)).unwrap();
        session.select_section(2).unwrap();
        assert!(session.last_result.is_some());
    }

    #[test]
    fn stale_result_is_rejected() {
        let mut session = uploaded_session();
        session.set_sections(sections(3));
        let section = session.select_section(0).unwrap();
        let stale = result_for(&section);

        // Selection changes between scoring and storing.
        session.select_section(1).unwrap();
        assert_eq!(
            session.store_result(stale).unwrap_err(),
            SessionError::NotSelected { requested: 0 }
        );
        assert!(session.last_result.is_none());
    }

    #[tokio::test]
    async fn store_registers_and_removes_sessions() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        let id = store
            .create(PathBuf::from("/tmp/a.wav"), "a.wav".into())
            .await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(id).await.is_some());
        assert!(store.get(Uuid::new_v4()).await.is_none());

        assert!(store.remove(id).await.is_some());
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_records_serialize_per_session() {
        let store = SessionStore::new();
        let id = store
            .create(PathBuf::from("/tmp/a.wav"), "a.wav".into())
            .await;
        let handle = store.get(id).await.unwrap();
        {
            let mut session = handle.lock().await;
            session.set_sections(sections(2));
            session.select_section(0).unwrap();
        }

        // Two concurrent Record flows against the same session: each
        // validates under the lock, scores outside it, then re-checks
        // the selection when storing. Both target the selected section,
        // so both store; the stored result always matches the selection
        // observed under that call's lock.
        let mut tasks = Vec::new();
        for _ in 0..2 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let section = { handle.lock().await.begin_recording(0)? };
                // Scoring happens outside the lock.
                let result = result_for(&section);
                handle.lock().await.store_result(result)
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let session = handle.lock().await;
        let stored = session.last_result.as_ref().unwrap();
        assert_eq!(Some(stored.section.id), session.selected_section_id);
    }
}
