//! vocalise-core - Vocal practice analysis library
//!
//! Pure analysis building blocks for the Vocalise practice coach:
//! audio decoding, pitch tracking, song segmentation into practice
//! sections, recording scoring, and textual feedback generation.
//!
//! No HTTP or session state lives here; the `vocalise-web` service
//! orchestrates these pieces.

pub mod audio;
pub mod feedback;
pub mod pitch;
pub mod scorer;
pub mod segmenter;
pub mod types;

pub use audio::{decode_file, AudioClip, AudioError};
pub use feedback::FeedbackEngine;
pub use scorer::{ReferenceScorer, ScoreError, Scorer, VoiceAnalysis};
pub use segmenter::{FixedWindowSegmenter, SegmentError, Segmenter};
pub use types::{
    AnalysisResult, Difficulty, FeedbackData, RecordingResult, ScoreData, Section, SectionInfo,
};
