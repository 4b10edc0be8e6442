//! Shared data model for song sections and scored recordings.

use serde::{Deserialize, Serialize};

/// Estimated difficulty of a practice section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A labeled time-span of the uploaded song, designated for practice.
///
/// Produced in bulk by the [`Segmenter`](crate::Segmenter); immutable
/// thereafter. Times are seconds from the start of the song, with
/// `0 <= start_time < end_time <= song_duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique within one session's section list.
    pub id: u32,
    /// Human-readable label, e.g. `"Section 2 (8.0s-16.0s)"`.
    pub name: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Derived: `end_time - start_time`.
    pub duration: f64,
    pub difficulty: Difficulty,
}

/// Per-dimension vocal-quality scores, each in `[0.0, 1.0]`.
///
/// Any subset may be absent: a dimension the scorer could not compute
/// (e.g. no voiced frames in the recording) is simply omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breath: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_onset: Option<f64>,
}

impl ScoreData {
    /// Scores that were actually computed.
    pub fn present(&self) -> Vec<f64> {
        [self.pitch, self.breath, self.pronunciation, self.vocal_onset]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Mean of the present dimensions, `None` when all are absent.
    pub fn overall(&self) -> Option<f64> {
        let present = self.present();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

/// Numeric analysis summary returned after a scored recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scores: ScoreData,
    pub overall_score: f64,
}

/// Textual coaching output generated alongside the numeric scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackData {
    pub feedbacks: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Identity of the section a recording was scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub id: u32,
    pub name: String,
}

/// The bundle stored as a session's current result after Record/Score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub analysis: AnalysisResult,
    pub feedback: FeedbackData,
    pub section: SectionInfo,
}
