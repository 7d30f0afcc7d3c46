//! # lyrics-core
//!
//! Shared vocabulary for the lyrics pipeline: decoded PCM, recognized
//! segments, the error type collaborators report with, and the traits the
//! batch scheduler drives.
//!
//! ```text
//! AudioDecoder::decode(path) → Pcm
//! TranscriptionEngine::new_session() → TranscriptionSession
//! TranscriptionSession::process(&Pcm) → lazy Iterator<Result<Segment>>
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod traits;
pub mod types;

pub use errors::{ResultExt, TranscriptionError};
pub use traits::{AudioDecoder, SegmentIter, TranscriptionEngine, TranscriptionSession};
pub use types::{Pcm, Segment, TARGET_SAMPLE_RATE};
