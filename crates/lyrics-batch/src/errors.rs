//! Per-job failure kinds.

use std::path::PathBuf;

use lyrics_core::TranscriptionError;
use thiserror::Error;

/// Why a single job did not produce a lyric file.
///
/// None of these abort the batch; they are reported per file.
#[derive(Debug, Error)]
pub enum JobError {
    /// The input could not be read or decoded.
    #[error("decode failed: {0}")]
    Decode(#[source] TranscriptionError),
    /// Session creation or inference failed.
    #[error("transcription failed: {0}")]
    Engine(#[source] TranscriptionError),
    /// The lyric file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        /// Destination that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The batch was cancelled before this job finished.
    #[error("cancelled")]
    Cancelled,
    /// A blocking worker panicked or was aborted.
    #[error("worker task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::Task("worker panicked".to_string())
        } else {
            Self::Task(err.to_string())
        }
    }
}
