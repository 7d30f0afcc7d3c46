//! Core data types: decoded audio and recognized segments.

use std::time::Duration;

/// Sample rate every decoder must produce and every engine consumes.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Pcm {
    /// Wrap mono `f32` samples recorded at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Raw samples in `[-1.0, 1.0]`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether no samples were decoded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration implied by the sample count.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// One recognized span of speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Offset of the first recognized token from the start of the file.
    pub start: Duration,
    /// Offset where the span ends.
    pub end: Duration,
    /// Recognized text, trimmed of surrounding whitespace.
    pub text: String,
}

impl Segment {
    /// Build a segment, trimming `text`.
    pub fn new(start: Duration, end: Duration, text: impl AsRef<str>) -> Self {
        Self {
            start,
            end,
            text: text.as_ref().trim().to_string(),
        }
    }
}
