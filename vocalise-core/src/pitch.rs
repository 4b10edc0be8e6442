//! Frame-based F0 tracking over the vocal range.
//!
//! Normalized autocorrelation per frame, with the signal decimated to
//! roughly 8 kHz first. That keeps the lag search small while leaving
//! plenty of resolution for the 80-800 Hz range singers occupy.

use crate::audio::{rms, AudioClip};

const VOICING_THRESHOLD: f32 = 0.5;
const FRAME_RMS_FLOOR: f32 = 1e-3;

/// F0 track for one clip. `frequencies[i] == 0.0` marks an unvoiced frame.
#[derive(Debug, Clone, Default)]
pub struct PitchTrack {
    /// Frame-center times in seconds.
    pub times: Vec<f64>,
    /// Estimated F0 in Hz, 0.0 for unvoiced frames.
    pub frequencies: Vec<f64>,
}

impl PitchTrack {
    /// Voiced frames as `(time, frequency)` pairs.
    pub fn voiced(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times
            .iter()
            .zip(self.frequencies.iter())
            .filter(|(_, &f)| f > 0.0)
            .map(|(&t, &f)| (t, f))
    }

    /// Fraction of frames that are voiced; 0.0 for an empty track.
    pub fn voiced_ratio(&self) -> f64 {
        if self.frequencies.is_empty() {
            return 0.0;
        }
        let voiced = self.frequencies.iter().filter(|&&f| f > 0.0).count();
        voiced as f64 / self.frequencies.len() as f64
    }

    /// Spread between lowest and highest voiced F0, in semitones.
    pub fn semitone_range(&self) -> f64 {
        let voiced: Vec<f64> = self.voiced().map(|(_, f)| f).collect();
        if voiced.is_empty() {
            return 0.0;
        }
        let min = voiced.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = voiced.iter().cloned().fold(0.0_f64, f64::max);
        if min <= 0.0 {
            return 0.0;
        }
        12.0 * (max / min).log2()
    }

    /// Coefficient of variation (std/mean) of the voiced F0 values.
    pub fn variation_coefficient(&self) -> f64 {
        let voiced: Vec<f64> = self.voiced().map(|(_, f)| f).collect();
        if voiced.len() < 2 {
            return 0.0;
        }
        let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
        if mean <= 0.0 {
            return 0.0;
        }
        let var = voiced.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / voiced.len() as f64;
        var.sqrt() / mean
    }
}

/// Autocorrelation pitch tracker.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    /// Lowest F0 considered, Hz.
    pub min_freq: f64,
    /// Highest F0 considered, Hz.
    pub max_freq: f64,
    /// Analysis frame size in decimated samples.
    pub frame_size: usize,
    /// Hop between frames in decimated samples.
    pub hop_size: usize,
    /// Decimation target rate, Hz.
    pub target_rate: u32,
}

impl Default for PitchTracker {
    fn default() -> Self {
        Self {
            min_freq: 80.0,
            max_freq: 800.0,
            frame_size: 512,
            hop_size: 256,
            target_rate: 8000,
        }
    }
}

impl PitchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track F0 across the clip.
    pub fn track(&self, clip: &AudioClip) -> PitchTrack {
        if clip.samples.is_empty() || clip.sample_rate == 0 {
            return PitchTrack::default();
        }

        let (samples, rate) = decimate(&clip.samples, clip.sample_rate, self.target_rate);

        let min_lag = ((rate as f64 / self.max_freq) as usize).max(2);
        let max_lag = ((rate as f64 / self.min_freq) as usize).min(self.frame_size - 1);
        if min_lag >= max_lag || samples.len() < self.frame_size {
            return PitchTrack::default();
        }

        let mut track = PitchTrack::default();
        let mut start = 0;
        while start + self.frame_size <= samples.len() {
            let frame = &samples[start..start + self.frame_size];
            let time = (start + self.frame_size / 2) as f64 / rate as f64;
            track.times.push(time);
            track
                .frequencies
                .push(frame_f0(frame, rate, min_lag, max_lag));
            start += self.hop_size;
        }
        track
    }
}

/// Estimate F0 of one frame, 0.0 when unvoiced.
fn frame_f0(frame: &[f32], rate: u32, min_lag: usize, max_lag: usize) -> f64 {
    if rms(frame) < FRAME_RMS_FLOOR {
        return 0.0;
    }

    let n = frame.len();
    let r0: f32 = frame.iter().map(|&s| s * s).sum();
    if r0 <= 0.0 {
        return 0.0;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    let mut corrs = vec![0.0f32; max_lag + 1];
    for lag in min_lag..=max_lag {
        let mut sum = 0.0f32;
        for i in 0..n - lag {
            sum += frame[i] * frame[i + lag];
        }
        // Compensate for the shrinking overlap window.
        let corr = sum * n as f32 / ((n - lag) as f32 * r0);
        corrs[lag] = corr;
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_corr < VOICING_THRESHOLD || best_lag == 0 {
        return 0.0;
    }

    // Parabolic interpolation around the peak for sub-sample lag precision.
    let lag = if best_lag > min_lag && best_lag < max_lag {
        let (a, b, c) = (
            corrs[best_lag - 1] as f64,
            corrs[best_lag] as f64,
            corrs[best_lag + 1] as f64,
        );
        let denom = a - 2.0 * b + c;
        if denom.abs() > 1e-12 {
            best_lag as f64 + 0.5 * (a - c) / denom
        } else {
            best_lag as f64
        }
    } else {
        best_lag as f64
    };

    rate as f64 / lag
}

/// Block-average decimation toward `target_rate`.
fn decimate(samples: &[f32], sample_rate: u32, target_rate: u32) -> (Vec<f32>, u32) {
    let factor = (sample_rate / target_rate.max(1)).max(1) as usize;
    if factor == 1 {
        return (samples.to_vec(), sample_rate);
    }
    let decimated = samples
        .chunks(factor)
        .map(|block| block.iter().sum::<f32>() / block.len() as f32)
        .collect();
    (decimated, sample_rate / factor as u32)
}
