//! Scripted decoder and engine shared by the integration tests.
#![allow(dead_code, missing_docs, unused_results, clippy::float_cmp)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lyrics_batch::{Scheduler, SchedulerConfig};
use lyrics_core::{
    AudioDecoder, Pcm, Segment, SegmentIter, TARGET_SAMPLE_RATE, TranscriptionEngine,
    TranscriptionError, TranscriptionSession,
};
use parking_lot::Mutex;

/// First sample value that makes the session fail.
pub const FAIL_INFERENCE: f32 = 2.0;
/// First sample value that makes the session panic.
pub const PANIC_INFERENCE: f32 = 3.0;

/// Concurrency probe: tracks how many callers are inside a section.
#[derive(Debug, Default)]
pub struct Probe {
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl Probe {
    pub fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        ProbeGuard(Arc::clone(self))
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

pub struct ProbeGuard(Arc<Probe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Ordered record of pipeline events across decoder and engine.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

/// Decoder that fabricates silence instead of reading files.
///
/// File names drive behavior: `fail-decode` fails, `fail-infer` and `panic`
/// mark the first sample so the mock session fails or panics.
pub struct MockDecoder {
    pub delay: Duration,
    pub default_duration: Duration,
    pub durations: HashMap<String, Duration>,
    pub decoded: Mutex<Vec<PathBuf>>,
    pub probe: Arc<Probe>,
    pub events: EventLog,
}

impl MockDecoder {
    pub fn new(events: &EventLog) -> Self {
        Self {
            delay: Duration::ZERO,
            default_duration: Duration::from_secs(1),
            durations: HashMap::new(),
            decoded: Mutex::new(Vec::new()),
            probe: Arc::new(Probe::default()),
            events: Arc::clone(events),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_duration(mut self, file_name: &str, duration: Duration) -> Self {
        self.durations.insert(file_name.to_string(), duration);
        self
    }

    pub fn calls(&self) -> usize {
        self.decoded.lock().len()
    }
}

impl AudioDecoder for MockDecoder {
    fn decode(&self, path: &Path) -> Result<Pcm, TranscriptionError> {
        let _busy = self.probe.enter();
        self.decoded.lock().push(path.to_path_buf());
        std::thread::sleep(self.delay);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("fail-decode") {
            return Err(TranscriptionError::AudioDecode(format!("cannot decode {name}")));
        }

        let duration = self
            .durations
            .get(&name)
            .copied()
            .unwrap_or(self.default_duration);
        let len = (duration.as_millis() as usize) * (TARGET_SAMPLE_RATE as usize) / 1000;
        let mut samples = vec![0.0_f32; len.max(1)];
        if name.contains("fail-infer") {
            samples[0] = FAIL_INFERENCE;
        } else if name.contains("panic") {
            samples[0] = PANIC_INFERENCE;
        }
        self.events.lock().push("decode");
        Ok(Pcm::new(samples, TARGET_SAMPLE_RATE))
    }
}

/// Engine that replays a fixed list of segments for every file.
pub struct MockEngine {
    pub segments: Vec<Segment>,
    pub concurrent_sessions: bool,
    pub creation_delay: Duration,
    pub inference_delay: Duration,
    pub failing_sessions: AtomicUsize,
    pub creation: Arc<Probe>,
    pub inference: Arc<Probe>,
    pub events: EventLog,
}

impl MockEngine {
    pub fn new(events: &EventLog) -> Self {
        Self {
            segments: Vec::new(),
            concurrent_sessions: true,
            creation_delay: Duration::ZERO,
            inference_delay: Duration::ZERO,
            failing_sessions: AtomicUsize::new(0),
            creation: Arc::new(Probe::default()),
            inference: Arc::new(Probe::default()),
            events: Arc::clone(events),
        }
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    /// Serialize session creation and make it slow enough to observe.
    pub fn single_session_creator(mut self, creation_delay: Duration) -> Self {
        self.concurrent_sessions = false;
        self.creation_delay = creation_delay;
        self
    }

    /// Make the next `n` `new_session` calls fail.
    pub fn fail_sessions(self, n: usize) -> Self {
        self.failing_sessions.store(n, Ordering::SeqCst);
        self
    }
}

impl TranscriptionEngine for MockEngine {
    fn new_session(&self) -> Result<Box<dyn TranscriptionSession>, TranscriptionError> {
        let _busy = self.creation.enter();
        std::thread::sleep(self.creation_delay);

        let failing = self
            .failing_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TranscriptionError::ModelNotAvailable(
                "scripted session failure".into(),
            ));
        }

        Ok(Box::new(MockSession {
            segments: self.segments.clone(),
            delay: self.inference_delay,
            probe: Arc::clone(&self.inference),
            events: Arc::clone(&self.events),
        }))
    }

    fn supports_concurrent_sessions(&self) -> bool {
        self.concurrent_sessions
    }
}

struct MockSession {
    segments: Vec<Segment>,
    delay: Duration,
    probe: Arc<Probe>,
    events: EventLog,
}

impl TranscriptionSession for MockSession {
    fn process<'a>(&'a mut self, pcm: &'a Pcm) -> SegmentIter<'a> {
        let mut started = false;
        let mut pending = self.segments.clone().into_iter();
        Box::new(std::iter::from_fn(move || {
            if !started {
                started = true;
                let _busy = self.probe.enter();
                self.events.lock().push("infer-start");
                std::thread::sleep(self.delay);
                self.events.lock().push("infer-end");
                let marker = pcm.samples().first().copied().unwrap_or_default();
                if marker == FAIL_INFERENCE {
                    return Some(Err(TranscriptionError::Inference(
                        "scripted inference failure".into(),
                    )));
                }
                if marker == PANIC_INFERENCE {
                    panic!("scripted engine panic");
                }
            }
            pending.next().map(Ok)
        }))
    }
}

pub fn seg(start_ms: u64, end_ms: u64, text: &str) -> Segment {
    Segment::new(
        Duration::from_millis(start_ms),
        Duration::from_millis(end_ms),
        text,
    )
}

pub fn config(decode: usize, infer: usize) -> SchedulerConfig {
    SchedulerConfig {
        decode_capacity: decode,
        infer_capacity: infer,
        ..SchedulerConfig::default()
    }
}

pub fn scheduler(
    config: SchedulerConfig,
    decoder: &Arc<MockDecoder>,
    engine: &Arc<MockEngine>,
) -> Scheduler {
    Scheduler::new(
        config,
        Arc::clone(decoder) as Arc<dyn AudioDecoder>,
        Arc::clone(engine) as Arc<dyn TranscriptionEngine>,
    )
}

/// Every permit handed out was returned and no slot is held.
pub fn assert_gates_idle(scheduler: &Scheduler) {
    for gate in [scheduler.decode_gate(), scheduler.infer_gate()] {
        assert_eq!(gate.occupied(), 0, "{} gate still occupied", gate.name());
        assert_eq!(gate.available(), gate.capacity(), "{} gate leaked", gate.name());
        assert_eq!(gate.admitted(), gate.released(), "{} gate unbalanced", gate.name());
    }
}
