//! Running real-time-factor bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cumulative audio transcribed since the batch started.
///
/// Shared by every job through an `Arc`. `record` is a single atomic add;
/// reads are not synchronized with it and may be slightly stale.
#[derive(Debug)]
pub struct ThroughputTracker {
    started: Instant,
    audio_millis: AtomicU64,
}

impl ThroughputTracker {
    /// Start the wall clock now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            audio_millis: AtomicU64::new(0),
        }
    }

    /// Add one completed job's audio duration.
    pub fn record(&self, audio: Duration) {
        let millis = u64::try_from(audio.as_millis()).unwrap_or(u64::MAX);
        let _ = self.audio_millis.fetch_add(millis, Ordering::Relaxed);
    }

    /// Audio transcribed so far.
    pub fn total_audio(&self) -> Duration {
        Duration::from_millis(self.audio_millis.load(Ordering::Relaxed))
    }

    /// Wall-clock time since [`Self::start`].
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Audio seconds per wall-clock second, recomputed on every call.
    pub fn current_rate(&self) -> f64 {
        rate(self.total_audio(), self.elapsed())
    }
}

/// Real-time factor for `audio` transcribed in `elapsed`; 0 when no time passed.
pub fn rate(audio: Duration, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        audio.as_secs_f64() / secs
    } else {
        0.0
    }
}
