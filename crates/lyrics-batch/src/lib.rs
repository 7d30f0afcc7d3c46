//! # lyrics-batch
//!
//! Batch orchestration for turning audio files into `.lrc` lyric files.
//!
//! Every input file becomes a [`Job`] running on its own task. Jobs pass two
//! independent [`Gate`]s: the decode gate bounds files being prepared, the
//! inference gate (normally much smaller) bounds files on the model. A shared
//! [`ThroughputTracker`] reports the running real-time factor, and the
//! [`writer`] persists each job's segments next to its source.
//!
//! ```text
//! skip check → decode gate → decode → inference gate → session → release → write → record
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod gate;
pub mod job;
pub mod report;
pub mod scheduler;
pub mod throughput;
pub mod writer;

pub use errors::JobError;
pub use gate::{Gate, GatePermit};
pub use job::{Job, JobOutcome, JobReport};
pub use report::BatchReport;
pub use scheduler::{DecodeSlotPolicy, Scheduler, SchedulerConfig};
pub use throughput::ThroughputTracker;
