//! Batch-level aggregation of job reports.

use std::time::Duration;

use crate::errors::JobError;
use crate::job::{JobOutcome, JobReport};
use crate::throughput::{self, ThroughputTracker};

/// Every job's result plus overall throughput.
#[derive(Debug)]
pub struct BatchReport {
    /// One entry per job, in submission order.
    pub jobs: Vec<JobReport>,
    /// Audio transcribed across the batch.
    pub total_audio: Duration,
    /// Wall-clock time the batch took.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Collect `jobs` and snapshot `tracker`.
    pub fn new(jobs: Vec<JobReport>, tracker: &ThroughputTracker) -> Self {
        Self {
            jobs,
            total_audio: tracker.total_audio(),
            elapsed: tracker.elapsed(),
        }
    }

    /// Jobs that wrote a lyric file.
    pub fn written(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, Ok(JobOutcome::Written { .. })))
            .count()
    }

    /// Jobs skipped because their output already existed.
    pub fn skipped(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_skipped()).count()
    }

    /// Jobs that failed.
    pub fn failed(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_failure()).count()
    }

    /// Failed jobs with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&std::path::Path, &JobError)> {
        self.jobs
            .iter()
            .filter_map(|j| j.outcome.as_ref().err().map(|e| (j.source.as_path(), e)))
    }

    /// Overall real-time factor.
    pub fn rate(&self) -> f64 {
        throughput::rate(self.total_audio, self.elapsed)
    }

    /// Process exit status: 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed() > 0)
    }
}
