//! Audio decoding and speech recognition collaborators for the lyrics pipeline.
//!
//! # Architecture
//!
//! ```text
//! audio file → symphonia decode → rubato resample to 16kHz mono f32   (SymphoniaDecoder)
//! → 30s windows → nemo128.onnx (preprocessor) → mel features [1, 128, T]
//! → encoder-model.onnx → encoder output [T', 1024]
//! → TDT greedy decode (decoder_joint-model.onnx in loop) → (token, frame) pairs
//! → vocab.txt lookup → timed pieces → segments                        (ParakeetEngine)
//! ```

pub mod audio;
pub mod decoder;
pub mod engine;
pub mod model;
pub mod segmenter;

pub use audio::SymphoniaDecoder;
pub use engine::ParakeetEngine;
