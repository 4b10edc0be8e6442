//! Recording scoring against a reference excerpt.
//!
//! Grades a user recording on four dimensions: pitch (against the
//! reference slice's melody), breath support, pronunciation clarity,
//! and vocal onset. Each dimension lands in `[0.0, 1.0]` and may be
//! absent when the signal defeats it (e.g. no voiced frames).

use thiserror::Error;

use crate::audio::{rms, AudioClip};
use crate::pitch::PitchTracker;
use crate::segmenter::SILENCE_FLOOR;
use crate::types::{AnalysisResult, ScoreData};

/// Scoring errors.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Nothing scoreable in the recording (silence or no signal).
    #[error("recording contains no scoreable signal")]
    NoVoice,
}

/// Pitch dimension detail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchMetrics {
    /// Fraction of frames within 50 cents of the reference melody.
    pub accuracy: f64,
    /// Inverse of frame-to-frame F0 jitter.
    pub stability: f64,
}

/// Breath dimension detail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathMetrics {
    /// Inverse of RMS coefficient of variation across 100 ms frames.
    pub volume_consistency: f64,
    /// Fraction of frames with energy above the active floor.
    pub sustainability: f64,
}

/// Pronunciation dimension detail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PronunciationMetrics {
    pub clarity: f64,
}

/// Vocal onset dimension detail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetMetrics {
    /// Smoothness of the first attack; lower for abrupt glottal hits.
    pub quality: f64,
    pub onset_count: usize,
}

/// Full analysis of one recording: per-dimension detail for the
/// feedback engine plus the public score summary.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceAnalysis {
    pub pitch: Option<PitchMetrics>,
    pub breath: Option<BreathMetrics>,
    pub pronunciation: Option<PronunciationMetrics>,
    pub onset: Option<OnsetMetrics>,
    pub scores: ScoreData,
    pub overall_score: f64,
}

impl VoiceAnalysis {
    pub fn to_analysis(&self) -> AnalysisResult {
        AnalysisResult {
            scores: self.scores.clone(),
            overall_score: self.overall_score,
        }
    }
}

/// Grades `(reference excerpt, recording)` pairs.
pub trait Scorer: Send + Sync {
    fn score(&self, reference: &AudioClip, recording: &AudioClip)
        -> Result<VoiceAnalysis, ScoreError>;
}

/// Default scorer comparing the recording against the reference slice.
#[derive(Debug, Clone, Default)]
pub struct ReferenceScorer {
    tracker: PitchTracker,
}

impl ReferenceScorer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scorer for ReferenceScorer {
    fn score(
        &self,
        reference: &AudioClip,
        recording: &AudioClip,
    ) -> Result<VoiceAnalysis, ScoreError> {
        if recording.samples.is_empty() || recording.rms() < SILENCE_FLOOR {
            return Err(ScoreError::NoVoice);
        }

        let pitch = self.pitch_metrics(reference, recording);
        let breath = breath_metrics(recording);
        let pronunciation = pronunciation_metrics(recording);
        let onset = onset_metrics(recording);

        let scores = ScoreData {
            pitch: pitch.map(|m| clamp(m.accuracy * 0.6 + m.stability * 0.4, 0.3, 1.0)),
            breath: breath.map(|m| (m.volume_consistency + m.sustainability) / 2.0),
            pronunciation: pronunciation.map(|m| m.clarity),
            vocal_onset: onset.map(|m| m.quality),
        };
        let overall_score = scores.overall().ok_or(ScoreError::NoVoice)?;

        Ok(VoiceAnalysis {
            pitch,
            breath,
            pronunciation,
            onset,
            scores,
            overall_score,
        })
    }
}

impl ReferenceScorer {
    fn pitch_metrics(
        &self,
        reference: &AudioClip,
        recording: &AudioClip,
    ) -> Option<PitchMetrics> {
        let user = self.tracker.track(recording);
        let voiced: Vec<f64> = user.voiced().map(|(_, f)| f).collect();
        if voiced.is_empty() {
            return None;
        }

        let target = self.tracker.track(reference);
        let accuracy = pitch_accuracy(&user.times, &user.frequencies, &target.times,
            &target.frequencies);
        let stability = pitch_stability(&voiced);

        Some(PitchMetrics {
            accuracy,
            stability,
        })
    }
}

/// Fraction of aligned frames within 50 cents of the reference melody.
///
/// Both tracks are resampled onto a common 100-point time grid over
/// their overlap; only instants where both are voiced count. Falls
/// back to a neutral 0.7 when there is nothing to compare against.
fn pitch_accuracy(
    user_times: &[f64],
    user_freqs: &[f64],
    target_times: &[f64],
    target_freqs: &[f64],
) -> f64 {
    const NEUTRAL: f64 = 0.7;
    const GRID_POINTS: usize = 100;

    if user_times.is_empty() || target_times.is_empty() {
        return NEUTRAL;
    }
    let min_time = user_times[0].max(target_times[0]);
    let max_time = user_times[user_times.len() - 1].min(target_times[target_times.len() - 1]);
    if max_time <= min_time {
        return NEUTRAL;
    }

    let mut within = 0usize;
    let mut compared = 0usize;
    for i in 0..GRID_POINTS {
        let t = min_time + (max_time - min_time) * i as f64 / (GRID_POINTS - 1) as f64;
        let u = interp(user_times, user_freqs, t);
        let r = interp(target_times, target_freqs, t);
        if u > 0.0 && r > 0.0 {
            compared += 1;
            let cents = 1200.0 * (u / r).log2();
            if cents.abs() <= 50.0 {
                within += 1;
            }
        }
    }
    if compared == 0 {
        return NEUTRAL;
    }
    (within as f64 / compared as f64).max(0.5)
}

/// Inverse of mean relative frame-to-frame F0 change.
fn pitch_stability(voiced_freqs: &[f64]) -> f64 {
    if voiced_freqs.len() < 2 {
        return 0.7;
    }
    let jitter: f64 = voiced_freqs
        .windows(2)
        .map(|w| (w[1] - w[0]).abs() / (w[0] + 1e-8))
        .sum::<f64>()
        / (voiced_freqs.len() - 1) as f64;
    clamp(1.0 - jitter * 50.0, 0.3, 1.0)
}

/// Volume consistency and sustain across the recording.
fn breath_metrics(recording: &AudioClip) -> Option<BreathMetrics> {
    let sr = recording.sample_rate as usize;
    if sr == 0 {
        return None;
    }

    // Volume consistency: RMS over 100 ms frames, half overlap.
    let frame = sr / 10;
    let hop = frame / 2;
    let mut rms_values = Vec::new();
    let mut i = 0;
    while i + frame <= recording.samples.len() {
        rms_values.push(rms(&recording.samples[i..i + frame]) as f64);
        i += hop.max(1);
    }
    let volume_consistency = if rms_values.is_empty() {
        0.6
    } else {
        let mean = rms_values.iter().sum::<f64>() / rms_values.len() as f64;
        if mean > 0.0 {
            let var = rms_values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / rms_values.len() as f64;
            clamp(1.0 - var.sqrt() / mean, 0.3, 1.0)
        } else {
            0.6
        }
    };

    // Sustainability: fraction of 50 ms frames with energy above 10% of mean.
    let frame = sr / 20;
    let hop = frame / 2;
    let mut energies = Vec::new();
    let mut i = 0;
    while i + frame <= recording.samples.len() {
        let energy: f64 = recording.samples[i..i + frame]
            .iter()
            .map(|&s| (s as f64).powi(2))
            .sum();
        energies.push(energy);
        i += hop.max(1);
    }
    let sustainability = if energies.is_empty() {
        0.6
    } else {
        let threshold = energies.iter().sum::<f64>() / energies.len() as f64 * 0.1;
        let active = energies.iter().filter(|&&e| e > threshold).count();
        clamp(active as f64 / energies.len() as f64, 0.4, 1.0)
    };

    Some(BreathMetrics {
        volume_consistency,
        sustainability,
    })
}

/// Articulation clarity from frame-to-frame spectral change.
///
/// Zero-crossing rate variation stands in for the spectral envelope
/// movement consonants produce; a static drone scores neutral.
fn pronunciation_metrics(recording: &AudioClip) -> Option<PronunciationMetrics> {
    let sr = recording.sample_rate as usize;
    if sr == 0 {
        return None;
    }
    let frame = sr / 40; // 25 ms
    let hop = frame / 2;
    let mut zcrs = Vec::new();
    let mut i = 0;
    while i + frame <= recording.samples.len() {
        let window = &recording.samples[i..i + frame];
        let crossings = window
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        zcrs.push(crossings as f64 / frame as f64);
        i += hop.max(1);
    }
    if zcrs.is_empty() {
        return None;
    }
    let mean = zcrs.iter().sum::<f64>() / zcrs.len() as f64;
    let std = (zcrs.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / zcrs.len() as f64).sqrt();
    Some(PronunciationMetrics {
        clarity: clamp(0.6 + std * 2.0, 0.4, 0.9),
    })
}

/// First-attack smoothness from the amplitude envelope.
fn onset_metrics(recording: &AudioClip) -> Option<OnsetMetrics> {
    let sr = recording.sample_rate as usize;
    if sr == 0 {
        return None;
    }
    let window = sr / 100; // 10 ms
    if window == 0 || recording.samples.len() < window {
        return None;
    }

    let envelope: Vec<f64> = recording
        .samples
        .chunks(window)
        .map(|w| w.iter().map(|&s| s.abs() as f64).sum::<f64>() / w.len() as f64)
        .collect();
    let max_env = envelope.iter().cloned().fold(0.0_f64, f64::max);
    if max_env <= 0.0 {
        return None;
    }

    let threshold = max_env * 0.3;
    let mut onset_count = 0usize;
    let mut first_onset = None;
    let mut above = false;
    for (idx, &e) in envelope.iter().enumerate() {
        if e > threshold && !above {
            onset_count += 1;
            if first_onset.is_none() {
                first_onset = Some(idx);
            }
        }
        above = e > threshold;
    }

    let quality = match first_onset {
        None => 0.6,
        Some(idx) => {
            // Steepest envelope rise within 50 ms around the attack.
            let lo = idx.saturating_sub(5);
            let hi = (idx + 5).min(envelope.len() - 1);
            let max_gradient = envelope[lo..=hi]
                .windows(2)
                .map(|w| w[1] - w[0])
                .fold(0.0_f64, f64::max);
            clamp(0.7 - max_gradient * 5.0, 0.3, 0.9)
        }
    };

    Some(OnsetMetrics {
        quality,
        onset_count,
    })
}

/// Linear interpolation with clamped ends, `np.interp` style.
fn interp(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    match xs.binary_search_by(|v| v.partial_cmp(&x).unwrap()) {
        Ok(i) => ys[i],
        Err(i) => {
            let (x0, x1) = (xs[i - 1], xs[i]);
            let (y0, y1) = (ys[i - 1], ys[i]);
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        }
    }
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}
