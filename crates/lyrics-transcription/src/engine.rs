//! ONNX session management and windowed inference.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lyrics_core::{
    Pcm, ResultExt, Segment, SegmentIter, TARGET_SAMPLE_RATE, TranscriptionEngine,
    TranscriptionError, TranscriptionSession,
};
use ort::session::Session;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::decoder;
use crate::model::{self, ModelPaths, Vocab};
use crate::segmenter::{self, TimedPiece};

/// Intra-op thread count for preprocessor and encoder ONNX sessions.
const PARALLEL_THREADS: usize = 4;
/// The decoder runs one step at a time.
const DECODER_THREADS: usize = 1;

/// Seconds of audio run through the encoder at once.
const WINDOW_SECONDS: usize = 30;
const WINDOW_SAMPLES: usize = WINDOW_SECONDS * TARGET_SAMPLE_RATE as usize;
/// Trailing windows shorter than this are not worth an encoder pass.
const MIN_WINDOW_SAMPLES: usize = TARGET_SAMPLE_RATE as usize / 10;

/// The three ONNX sessions one transcription needs.
///
/// `Session::run` takes `&mut self`, so a set is owned by exactly one
/// transcription session at a time.
struct OnnxSessions {
    preprocessor: Session,
    encoder: Session,
    decoder_joint: Session,
}

impl OnnxSessions {
    fn load(paths: &ModelPaths) -> Result<Self, TranscriptionError> {
        let preprocessor = Session::builder()
            .inference("session builder")?
            .with_intra_threads(PARALLEL_THREADS)
            .inference("set threads")?
            .commit_from_file(&paths.preprocessor)
            .inference("load preprocessor")?;
        debug!("loaded preprocessor");

        let encoder = Session::builder()
            .inference("session builder")?
            .with_intra_threads(PARALLEL_THREADS)
            .inference("set threads")?
            .commit_from_file(&paths.encoder)
            .inference("load encoder")?;
        debug!("loaded encoder");

        let decoder_joint = Session::builder()
            .inference("session builder")?
            .with_intra_threads(DECODER_THREADS)
            .inference("set threads")?
            .commit_from_file(&paths.decoder_joint)
            .inference("load decoder")?;
        debug!("loaded decoder_joint");

        Ok(Self {
            preprocessor,
            encoder,
            decoder_joint,
        })
    }
}

struct Shared {
    paths: ModelPaths,
    vocab: Vocab,
    /// Session sets returned by finished transcriptions.
    idle: Mutex<Vec<OnnxSessions>>,
}

/// [`TranscriptionEngine`] running the parakeet-tdt ONNX export.
///
/// Holds the vocabulary and a pool of ONNX session sets. Each
/// [`TranscriptionEngine::new_session`] checks a set out of the pool (loading
/// a new one when the pool is empty) and returns it when the session drops,
/// so the pool grows to the number of concurrently running transcriptions.
pub struct ParakeetEngine {
    shared: Arc<Shared>,
}

impl ParakeetEngine {
    /// Load the engine from `model_dir` on a blocking thread.
    ///
    /// This is CPU-intensive (loads ~600MB of model weights). One session set
    /// is loaded eagerly so a broken model fails here rather than per file.
    pub async fn new(model_dir: PathBuf) -> Result<Arc<Self>, TranscriptionError> {
        tokio::task::spawn_blocking(move || Self::load(&model_dir))
            .await
            .inference("task join")?
            .map(Arc::new)
    }

    /// Blocking variant of [`Self::new`].
    pub fn load(model_dir: &Path) -> Result<Self, TranscriptionError> {
        info!(
            "loading transcription model from {}...",
            model_dir.display()
        );
        let paths = ModelPaths::from_dir(model_dir);
        let missing = paths.missing();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(TranscriptionError::ModelNotAvailable(format!(
                "missing model files: {}",
                names.join(", ")
            )));
        }

        let vocab = model::load_vocab(&paths.vocab)?;
        let sessions = OnnxSessions::load(&paths)?;

        info!(
            vocab_size = vocab.tokens.len(),
            blank_idx = vocab.blank_idx,
            "transcription engine ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                paths,
                vocab,
                idle: Mutex::new(vec![sessions]),
            }),
        })
    }

    /// Number of session sets currently parked in the pool.
    pub fn idle_sessions(&self) -> usize {
        self.shared.idle.lock().len()
    }
}

impl TranscriptionEngine for ParakeetEngine {
    fn new_session(&self) -> Result<Box<dyn TranscriptionSession>, TranscriptionError> {
        let pooled = self.shared.idle.lock().pop();
        let sessions = match pooled {
            Some(sessions) => sessions,
            None => {
                debug!("session pool empty, loading another session set");
                OnnxSessions::load(&self.shared.paths)?
            }
        };
        Ok(Box::new(ParakeetSession {
            shared: Arc::clone(&self.shared),
            sessions: Some(sessions),
        }))
    }
}

/// One file's view of the engine; returns its session set to the pool on drop.
struct ParakeetSession {
    shared: Arc<Shared>,
    sessions: Option<OnnxSessions>,
}

impl Drop for ParakeetSession {
    fn drop(&mut self) {
        if let Some(sessions) = self.sessions.take() {
            self.shared.idle.lock().push(sessions);
        }
    }
}

impl ParakeetSession {
    /// Run preprocessor → encoder → TDT decode on one window.
    fn transcribe_window(
        &mut self,
        samples: &[f32],
        offset: Duration,
    ) -> Result<Vec<Segment>, TranscriptionError> {
        let sessions = self
            .sessions
            .as_mut()
            .ok_or_else(|| TranscriptionError::Inference("session already released".into()))?;

        let (features, features_len) =
            decoder::run_preprocessor(&mut sessions.preprocessor, samples)?;
        let encoder_out = decoder::run_encoder(&mut sessions.encoder, &features, features_len)?;
        let tokens = decoder::greedy_decode(
            &encoder_out,
            &mut sessions.decoder_joint,
            &self.shared.vocab,
        )?;

        let pieces: Vec<TimedPiece> = tokens
            .iter()
            .filter_map(|t| {
                self.shared.vocab.token(t.id).map(|text| TimedPiece {
                    text: text.to_string(),
                    frame: t.frame,
                })
            })
            .collect();
        Ok(segmenter::segment_pieces(&pieces, offset))
    }
}

impl TranscriptionSession for ParakeetSession {
    fn process<'a>(&'a mut self, pcm: &'a Pcm) -> SegmentIter<'a> {
        Box::new(WindowedSegments {
            session: self,
            pcm,
            next_window: 0,
            pending: VecDeque::new(),
            done: false,
        })
    }
}

/// Lazily transcribes one window at a time as segments are pulled.
struct WindowedSegments<'a> {
    session: &'a mut ParakeetSession,
    pcm: &'a Pcm,
    next_window: usize,
    pending: VecDeque<Segment>,
    done: bool,
}

impl Iterator for WindowedSegments<'_> {
    type Item = Result<Segment, TranscriptionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(segment) = self.pending.pop_front() {
                return Some(Ok(segment));
            }
            if self.done {
                return None;
            }
            if self.pcm.sample_rate() != TARGET_SAMPLE_RATE {
                self.done = true;
                return Some(Err(TranscriptionError::Inference(format!(
                    "expected {TARGET_SAMPLE_RATE}Hz audio, got {}Hz",
                    self.pcm.sample_rate()
                ))));
            }

            let samples = self.pcm.samples();
            let start = self.next_window * WINDOW_SAMPLES;
            let end = (start + WINDOW_SAMPLES).min(samples.len());
            if end <= start || end - start < MIN_WINDOW_SAMPLES {
                self.done = true;
                continue;
            }

            let offset = Duration::from_secs((self.next_window * WINDOW_SECONDS) as u64);
            self.next_window += 1;
            match self.session.transcribe_window(&samples[start..end], offset) {
                Ok(segments) => {
                    debug!(
                        window = self.next_window,
                        segments = segments.len(),
                        "transcribed window"
                    );
                    self.pending.extend(segments);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
