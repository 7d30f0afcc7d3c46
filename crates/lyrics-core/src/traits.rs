//! Collaborator seams driven by the batch scheduler.
//!
//! All methods are synchronous and may block for a long time; callers run
//! them on a blocking thread pool.

use std::path::Path;

use crate::errors::TranscriptionError;
use crate::types::{Pcm, Segment};

/// Forward-only, lazily produced segment sequence.
pub type SegmentIter<'a> = Box<dyn Iterator<Item = Result<Segment, TranscriptionError>> + Send + 'a>;

/// Turns an audio file into mono PCM at [`crate::TARGET_SAMPLE_RATE`].
pub trait AudioDecoder: Send + Sync {
    /// Decode the whole file at `path`.
    fn decode(&self, path: &Path) -> Result<Pcm, TranscriptionError>;
}

/// A loaded model that hands out independent inference sessions.
pub trait TranscriptionEngine: Send + Sync {
    /// Create a fresh session for one file.
    fn new_session(&self) -> Result<Box<dyn TranscriptionSession>, TranscriptionError>;

    /// Whether [`Self::new_session`] may be called from several threads at once.
    ///
    /// When `false` the scheduler serializes session creation; inference on
    /// already-created sessions still runs in parallel.
    fn supports_concurrent_sessions(&self) -> bool {
        true
    }
}

/// Per-file inference context. Never shared between files.
pub trait TranscriptionSession: Send {
    /// Recognize `pcm`, yielding segments in chronological order.
    ///
    /// The iterator does its work as it is advanced; an `Err` item ends the
    /// useful part of the sequence.
    fn process<'a>(&'a mut self, pcm: &'a Pcm) -> SegmentIter<'a>;
}
