//! Dual-gate batch scheduler.
//!
//! Each job runs on its own task:
//!
//! 1. skip if the lyric file already exists, or an earlier job in the batch
//!    writes the same one
//! 2. acquire a decode slot, decode on the blocking pool
//! 3. acquire an inference slot, run a fresh session on the blocking pool
//! 4. release the inference slot, then the decode slot
//! 5. write the lyric file and record throughput
//!
//! Both slots are [`GatePermit`](crate::GatePermit)s, so every exit path
//! (errors, cancellation, panics in workers) gives them back.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use lyrics_core::{AudioDecoder, Pcm, Segment, TranscriptionEngine};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::JobError;
use crate::gate::Gate;
use crate::job::{Job, JobOutcome, JobReport};
use crate::report::BatchReport;
use crate::throughput::ThroughputTracker;
use crate::writer;

/// When a job gives back its decode slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeSlotPolicy {
    /// Keep the decode slot until the job finishes, bounding the number of
    /// decoded buffers alive at once to the decode capacity.
    #[default]
    HoldUntilDone,
    /// Release it as soon as decoding completes so the next file can start
    /// decoding while this one waits for inference.
    ReleaseAfterDecode,
}

/// Concurrency limits for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Files that may be past the decode gate at once.
    pub decode_capacity: usize,
    /// Files that may be on the inference engine at once.
    pub infer_capacity: usize,
    /// Decode slot release policy.
    pub decode_slot_policy: DecodeSlotPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            decode_capacity: 4,
            infer_capacity: 1,
            decode_slot_policy: DecodeSlotPolicy::HoldUntilDone,
        }
    }
}

/// A job handed to the runtime, or one settled before spawning.
enum Pending {
    Running {
        source: std::path::PathBuf,
        handle: JoinHandle<JobReport>,
    },
    Done(JobReport),
}

/// Runs jobs through the decode and inference gates.
///
/// Cheap to clone; clones share gates, collaborators and the cancellation
/// token.
#[derive(Clone)]
pub struct Scheduler {
    decoder: Arc<dyn AudioDecoder>,
    engine: Arc<dyn TranscriptionEngine>,
    decode_gate: Arc<Gate>,
    infer_gate: Arc<Gate>,
    /// Serializes session creation for engines that cannot create sessions concurrently.
    session_lock: Arc<Mutex<()>>,
    policy: DecodeSlotPolicy,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Build a scheduler over the given collaborators.
    pub fn new(
        config: SchedulerConfig,
        decoder: Arc<dyn AudioDecoder>,
        engine: Arc<dyn TranscriptionEngine>,
    ) -> Self {
        if config.decode_capacity < config.infer_capacity {
            warn!(
                decode = config.decode_capacity,
                infer = config.infer_capacity,
                "decode capacity below inference capacity; inference slots may idle"
            );
        }
        Self {
            decoder,
            engine,
            decode_gate: Arc::new(Gate::new("decode", config.decode_capacity)),
            infer_gate: Arc::new(Gate::new("infer", config.infer_capacity)),
            session_lock: Arc::new(Mutex::new(())),
            policy: config.decode_slot_policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Gate bounding files being prepared.
    pub fn decode_gate(&self) -> &Gate {
        &self.decode_gate
    }

    /// Gate bounding files on the engine.
    pub fn infer_gate(&self) -> &Gate {
        &self.infer_gate
    }

    /// Token that cancels queued and future gate acquisitions.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop admitting jobs. Jobs waiting on a gate finish with
    /// [`JobError::Cancelled`]; work already on a blocking thread completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run every job concurrently and wait for all of them.
    ///
    /// Reports come back in submission order regardless of completion order.
    /// When several jobs share a destination only the first one runs; the
    /// rest are reported as skipped without touching either gate.
    pub async fn run_batch(
        &self,
        jobs: Vec<Job>,
        throughput: &Arc<ThroughputTracker>,
    ) -> BatchReport {
        info!(
            jobs = jobs.len(),
            decode_capacity = self.decode_gate.capacity(),
            infer_capacity = self.infer_gate.capacity(),
            policy = ?self.policy,
            "starting batch"
        );

        let mut claimed = HashSet::new();
        let mut pending = Vec::with_capacity(jobs.len());
        for job in jobs {
            if claimed.insert(job.destination.clone()) {
                let source = job.source.clone();
                let handle = tokio::spawn(self.clone().run_job(job, Arc::clone(throughput)));
                pending.push(Pending::Running { source, handle });
            } else {
                info!(
                    "skipping {} as {} is produced by an earlier file",
                    job.display_name(),
                    crate::job::display_name(&job.destination)
                );
                pending.push(Pending::Done(JobReport {
                    source: job.source,
                    outcome: Ok(JobOutcome::Skipped {
                        destination: job.destination,
                    }),
                }));
            }
        }

        let tasks = pending.into_iter().map(|pending| async move {
            match pending {
                Pending::Running { source, handle } => {
                    handle.await.unwrap_or_else(|e| JobReport {
                        source,
                        outcome: Err(e.into()),
                    })
                }
                Pending::Done(report) => report,
            }
        });
        let reports = futures::future::join_all(tasks).await;

        let report = BatchReport::new(reports, throughput);
        info!(
            written = report.written(),
            skipped = report.skipped(),
            failed = report.failed(),
            audio_secs = report.total_audio.as_secs_f64(),
            rate = %format!("{:.2}x", report.rate()),
            "batch finished"
        );
        report
    }

    #[instrument(skip_all, fields(file = %job.display_name()))]
    async fn run_job(self, job: Job, throughput: Arc<ThroughputTracker>) -> JobReport {
        let outcome = self.process(&job, &throughput).await;
        match &outcome {
            Ok(JobOutcome::Skipped { destination }) => info!(
                "skipping {} as {} already exists",
                job.display_name(),
                crate::job::display_name(destination)
            ),
            Ok(JobOutcome::Written {
                segments, audio, ..
            }) => info!(
                segments,
                audio_secs = audio.as_secs_f64(),
                rate = %format!("{:.2}x", throughput.current_rate()),
                "transcribed"
            ),
            Err(e) => warn!(error = %e, "job failed"),
        }
        JobReport {
            source: job.source,
            outcome,
        }
    }

    async fn process(
        &self,
        job: &Job,
        throughput: &ThroughputTracker,
    ) -> Result<JobOutcome, JobError> {
        if job.destination.exists() {
            return Ok(JobOutcome::Skipped {
                destination: job.destination.clone(),
            });
        }

        let decode_permit = self.decode_gate.acquire(&self.cancel).await?;
        let pcm = self.decode(&job.source).await?;
        let audio = pcm.duration();
        debug!(audio_secs = audio.as_secs_f64(), "decoded");

        let decode_permit = match self.policy {
            DecodeSlotPolicy::HoldUntilDone => Some(decode_permit),
            DecodeSlotPolicy::ReleaseAfterDecode => {
                drop(decode_permit);
                None
            }
        };

        let segments = {
            let _infer_permit = self.infer_gate.acquire(&self.cancel).await?;
            self.transcribe(pcm).await?
        };
        drop(decode_permit);

        let contents = writer::render(&segments);
        let destination = job.destination.clone();
        let write_to = destination.clone();
        tokio::task::spawn_blocking(move || writer::write_lyrics(&write_to, &contents))
            .await?
            .map_err(|source| JobError::OutputWrite {
                path: destination.clone(),
                source,
            })?;

        throughput.record(audio);
        Ok(JobOutcome::Written {
            destination,
            segments: segments.len(),
            audio,
        })
    }

    async fn decode(&self, source: &Path) -> Result<Pcm, JobError> {
        let decoder = Arc::clone(&self.decoder);
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || decoder.decode(&source))
            .await?
            .map_err(JobError::Decode)
    }

    /// Run a fresh session over `pcm`, collecting segments in production order.
    async fn transcribe(&self, pcm: Pcm) -> Result<Vec<Segment>, JobError> {
        let engine = Arc::clone(&self.engine);
        let session_lock = (!engine.supports_concurrent_sessions())
            .then(|| Arc::clone(&self.session_lock));

        tokio::task::spawn_blocking(move || -> Result<Vec<Segment>, JobError> {
            let mut session = {
                let _guard = session_lock.as_ref().map(|lock| lock.lock());
                engine.new_session().map_err(JobError::Engine)?
            };
            let segments: Result<Vec<Segment>, _> = session.process(&pcm).collect();
            segments.map_err(JobError::Engine)
        })
        .await?
    }
}
