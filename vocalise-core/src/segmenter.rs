//! Song segmentation into practice sections.

use thiserror::Error;

use crate::audio::AudioClip;
use crate::pitch::{PitchTrack, PitchTracker};
use crate::types::{Difficulty, Section};

/// Amplitude floor below which a whole song counts as silence.
pub const SILENCE_FLOOR: f32 = 1e-4;

/// Segmentation errors.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Song shorter than one minimum-length section.
    #[error("song too short to segment: {duration:.1}s < {minimum:.1}s")]
    TooShort { duration: f64, minimum: f64 },

    /// No audible signal anywhere in the song.
    #[error("song contains no audible signal")]
    Silent,
}

/// Splits a song into an ordered, non-overlapping sequence of sections.
pub trait Segmenter: Send + Sync {
    fn segment(&self, song: &AudioClip) -> Result<Vec<Section>, SegmentError>;
}

/// Fixed-length window segmenter.
///
/// Cuts the song into consecutive windows of `section_seconds`, keeping a
/// trailing partial window only when it reaches `min_section_seconds`.
/// Each section gets a difficulty estimate from its pitch contour.
#[derive(Debug, Clone)]
pub struct FixedWindowSegmenter {
    pub section_seconds: f64,
    pub min_section_seconds: f64,
    tracker: PitchTracker,
}

impl Default for FixedWindowSegmenter {
    fn default() -> Self {
        Self {
            section_seconds: 8.0,
            min_section_seconds: 3.0,
            tracker: PitchTracker::default(),
        }
    }
}

impl FixedWindowSegmenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Segmenter for FixedWindowSegmenter {
    fn segment(&self, song: &AudioClip) -> Result<Vec<Section>, SegmentError> {
        let duration = song.duration();
        if duration < self.min_section_seconds {
            return Err(SegmentError::TooShort {
                duration,
                minimum: self.min_section_seconds,
            });
        }
        if song.rms() < SILENCE_FLOOR {
            return Err(SegmentError::Silent);
        }

        let mut sections = Vec::new();
        let mut start = 0.0_f64;
        let mut id = 0u32;
        while start < duration {
            let end = (start + self.section_seconds).min(duration);
            if end - start < self.min_section_seconds {
                break;
            }

            let track = self.tracker.track(&song.slice(start, end));
            let difficulty = estimate_difficulty(&track, end - start);

            sections.push(Section {
                id,
                name: format!("Section {} ({:.1}s-{:.1}s)", id + 1, start, end),
                start_time: start,
                end_time: end,
                duration: end - start,
                difficulty,
            });
            id += 1;
            start = end;
        }

        tracing::debug!(
            sections = sections.len(),
            duration_seconds = format!("{duration:.1}"),
            "song segmented"
        );
        Ok(sections)
    }
}

/// Score a section's difficulty from its pitch contour.
///
/// Four factors each contribute 0-2 points: pitch range, pitch variation,
/// voicing instability, and section length. 5+ is hard, 3+ is medium.
fn estimate_difficulty(track: &PitchTrack, duration: f64) -> Difficulty {
    if track.voiced().next().is_none() {
        return Difficulty::Easy;
    }

    let mut score = 0u32;

    let range = track.semitone_range();
    if range > 12.0 {
        score += 2;
    } else if range > 7.0 {
        score += 1;
    }

    let variation = track.variation_coefficient();
    if variation > 0.15 {
        score += 2;
    } else if variation > 0.08 {
        score += 1;
    }

    // A patchy pitch contour is harder to imitate than a steady one.
    let voiced_ratio = track.voiced_ratio();
    if voiced_ratio < 0.5 {
        score += 2;
    } else if voiced_ratio < 0.7 {
        score += 1;
    }

    if duration > 12.0 {
        score += 2;
    } else if duration > 8.0 {
        score += 1;
    }

    match score {
        s if s >= 5 => Difficulty::Hard,
        s if s >= 3 => Difficulty::Medium,
        _ => Difficulty::Easy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, seconds: f32, sample_rate: u32) -> AudioClip {
        let n = (seconds * sample_rate as f32) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioClip::new(samples, sample_rate)
    }

    #[test]
    fn thirty_second_song_yields_ordered_cover() {
        let song = sine(440.0, 30.0, 22050);
        let sections = FixedWindowSegmenter::new().segment(&song).unwrap();

        // 8 + 8 + 8 + 6 second windows.
        assert_eq!(sections.len(), 4);
        let span_sum: f64 = sections.iter().map(|s| s.duration).sum();
        assert!(span_sum <= song.duration() + 1e-6);

        for (idx, section) in sections.iter().enumerate() {
            assert_eq!(section.id, idx as u32);
            assert!(section.start_time < section.end_time);
            assert!(section.end_time <= song.duration() + 1e-6);
            assert!(
                (section.duration - (section.end_time - section.start_time)).abs() < 1e-9
            );
            assert!(section.duration >= 3.0);
        }

        // Non-overlapping and ordered.
        for pair in sections.windows(2) {
            assert!((pair[0].end_time - pair[1].start_time).abs() < 1e-9);
        }
        assert!(sections[0].name.starts_with("Section 1"));
    }

    #[test]
    fn too_short_song_is_rejected() {
        let song = sine(440.0, 2.0, 22050);
        let err = FixedWindowSegmenter::new().segment(&song).unwrap_err();
        assert!(matches!(err, SegmentError::TooShort { .. }));
    }

    #[test]
    fn silent_song_is_rejected() {
        let song = AudioClip::new(vec![0.0; 22050 * 10], 22050);
        let err = FixedWindowSegmenter::new().segment(&song).unwrap_err();
        assert!(matches!(err, SegmentError::Silent));
    }

    #[test]
    fn trailing_window_below_minimum_is_dropped() {
        // 10s song: one 8s window plus a 2s remainder below the 3s minimum.
        let song = sine(440.0, 10.0, 22050);
        let sections = FixedWindowSegmenter::new().segment(&song).unwrap();
        assert_eq!(sections.len(), 1);
        assert!((sections[0].end_time - 8.0).abs() < 1e-6);
    }

    #[test]
    fn steady_short_tone_is_easy() {
        let song = sine(440.0, 8.0, 22050);
        let sections = FixedWindowSegmenter::new().segment(&song).unwrap();
        assert_eq!(sections[0].difficulty, Difficulty::Easy);
    }
}
