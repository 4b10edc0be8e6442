//! Audio decoding and in-memory clip handling.
//!
//! Uses symphonia for format-agnostic decoding (MP3, WAV, FLAC, M4A, OGG).
//! Everything downstream works on mono f32 PCM.

use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

/// Audio decoding errors.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio file: {0}")]
    Open(#[source] std::io::Error),

    /// Unrecognized or corrupt container/codec.
    #[error("unsupported or corrupt audio: {0}")]
    Format(String),

    #[error("no audio track found in file")]
    NoAudioTrack,

    #[error("failed to decode audio: {0}")]
    Decode(String),
}

/// Decoded mono audio.
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Extract the span `[start_seconds, end_seconds)`, clamped to the clip.
    pub fn slice(&self, start_seconds: f64, end_seconds: f64) -> AudioClip {
        let start = ((start_seconds.max(0.0) * self.sample_rate as f64) as usize)
            .min(self.samples.len());
        let end =
            ((end_seconds.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len());
        let samples = if end > start {
            self.samples[start..end].to_vec()
        } else {
            Vec::new()
        };
        AudioClip::new(samples, self.sample_rate)
    }

    /// Root mean square amplitude of the whole clip.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }
}

/// RMS of a sample window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Decode an audio file to a mono [`AudioClip`].
///
/// Probes the container, picks the default audio track, decodes all
/// packets and averages channels down to mono.
pub fn decode_file(path: &Path) -> Result<AudioClip, AudioError> {
    tracing::debug!(path = %path.display(), "decoding audio file");

    let file = std::fs::File::open(path).map_err(AudioError::Open)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Format(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Format("sample rate unknown".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream.
                break;
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        mix_to_mono(&decoded, &mut samples);
    }

    let clip = AudioClip::new(samples, sample_rate);
    tracing::debug!(
        path = %path.display(),
        sample_rate,
        duration_seconds = format!("{:.2}", clip.duration()),
        "audio decoded"
    );
    Ok(clip)
}

/// Average all channels of a decoded buffer into `out`.
fn mix_to_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    fn mix<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
    where
        S: Sample,
        f32: FromSample<S>,
    {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();
        out.reserve(frames);
        for frame in 0..frames {
            let mut sum = 0.0f32;
            for ch in 0..channels {
                sum += f32::from_sample(buf.chan(ch)[frame]);
            }
            out.push(sum / channels as f32);
        }
    }

    match decoded {
        AudioBufferRef::U8(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::U16(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::U24(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::U32(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::S8(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::S16(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::S24(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::S32(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::F32(buf) => mix(buf.as_ref(), out),
        AudioBufferRef::F64(buf) => mix(buf.as_ref(), out),
    }
}
