//! Model file layout and vocabulary loading.

use std::path::{Path, PathBuf};

use lyrics_core::TranscriptionError;

/// Required model files, relative to the model directory.
pub const MODEL_FILES: &[&str] = &[
    "nemo128.onnx",
    "encoder-model.onnx",
    "decoder_joint-model.onnx",
    "vocab.txt",
];

/// Token the TDT decoder emits for "no symbol at this frame".
const BLANK_TOKEN: &str = "<blk>";

/// Resolved paths of the parakeet-tdt ONNX export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Mel-spectrogram preprocessor.
    pub preprocessor: PathBuf,
    /// Conformer encoder.
    pub encoder: PathBuf,
    /// Prediction network + joint network.
    pub decoder_joint: PathBuf,
    /// SentencePiece vocabulary, one token per line.
    pub vocab: PathBuf,
}

impl ModelPaths {
    /// Lay the expected file names over `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Self {
        Self {
            preprocessor: model_dir.join(MODEL_FILES[0]),
            encoder: model_dir.join(MODEL_FILES[1]),
            decoder_joint: model_dir.join(MODEL_FILES[2]),
            vocab: model_dir.join(MODEL_FILES[3]),
        }
    }

    fn all(&self) -> [&Path; 4] {
        [
            self.preprocessor.as_path(),
            self.encoder.as_path(),
            self.decoder_joint.as_path(),
            self.vocab.as_path(),
        ]
    }

    /// Files that are not present on disk.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.all()
            .into_iter()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }
}

/// Vocabulary plus the index of the blank token.
#[derive(Debug, Clone)]
pub struct Vocab {
    /// Token strings indexed by id.
    pub tokens: Vec<String>,
    /// Id of the blank token.
    pub blank_idx: usize,
}

impl Vocab {
    /// Number of token logits the joint network emits before the duration logits.
    pub fn logit_count(&self) -> usize {
        self.tokens.len().max(self.blank_idx + 1)
    }

    /// Token text for `id`, if known.
    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }
}

/// Load vocabulary from vocab.txt.
///
/// Lines are either `token` or `token id`. When no `<blk>` entry exists the
/// blank id is one past the last token.
pub fn load_vocab(vocab_path: &Path) -> Result<Vocab, TranscriptionError> {
    let content = std::fs::read_to_string(vocab_path).map_err(|e| {
        TranscriptionError::ModelNotAvailable(format!("failed to read vocab.txt: {e}"))
    })?;
    Ok(parse_vocab(&content))
}

fn parse_vocab(content: &str) -> Vocab {
    let tokens: Vec<String> = content
        .lines()
        .map(|line| match line.rsplit_once(' ') {
            Some((token, id)) if id.parse::<usize>().is_ok() => token.to_string(),
            _ => line.to_string(),
        })
        .collect();
    let blank_idx = tokens
        .iter()
        .position(|t| t == BLANK_TOKEN)
        .unwrap_or(tokens.len());
    Vocab { tokens, blank_idx }
}
