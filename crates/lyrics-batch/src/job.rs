//! Jobs and their per-file results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::JobError;
use crate::writer;

/// One input file's end-to-end transcription task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Audio file to transcribe.
    pub source: PathBuf,
    /// Lyric file to produce.
    pub destination: PathBuf,
}

impl Job {
    /// Create a job writing next to `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = writer::destination_for(&source);
        Self {
            source,
            destination,
        }
    }

    /// File name of the source for log lines.
    pub fn display_name(&self) -> String {
        display_name(&self.source)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// What a successful job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Segments were recognized and written.
    Written {
        /// Lyric file that was created.
        destination: PathBuf,
        /// Number of lines written.
        segments: usize,
        /// Decoded audio duration.
        audio: Duration,
    },
    /// The destination already existed, or an earlier job in the same batch
    /// writes it; nothing was decoded.
    Skipped {
        /// The lyric file that is left alone.
        destination: PathBuf,
    },
}

/// Result of one job within a batch.
#[derive(Debug)]
pub struct JobReport {
    /// Input file.
    pub source: PathBuf,
    /// Success or the reason for failure.
    pub outcome: Result<JobOutcome, JobError>,
}

impl JobReport {
    /// Whether the job ended in an error.
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    /// Whether the job was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Ok(JobOutcome::Skipped { .. }))
    }
}
