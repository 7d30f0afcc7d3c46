//! Errors reported by decoders and transcription engines.

use std::fmt::Display;

/// Errors that can occur while decoding or transcribing a single file.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// Model files not found or unreadable.
    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    /// Session creation or inference failure.
    #[error("inference error: {0}")]
    Inference(String),

    /// Audio decoding failure (unsupported format, corrupt data).
    #[error("audio decode error: {0}")]
    AudioDecode(String),

    /// Resampling failure.
    #[error("resample error: {0}")]
    Resample(String),

    /// I/O error (file read/write).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attach context to foreign errors on the inference path.
pub trait ResultExt<T> {
    /// Map the error into [`TranscriptionError::Inference`] prefixed by `context`.
    fn inference(self, context: &str) -> Result<T, TranscriptionError>;

    /// Map the error into [`TranscriptionError::AudioDecode`] prefixed by `context`.
    fn audio_decode(self, context: &str) -> Result<T, TranscriptionError>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn inference(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Inference(format!("{context}: {e}")))
    }

    fn audio_decode(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::AudioDecode(format!("{context}: {e}")))
    }
}
