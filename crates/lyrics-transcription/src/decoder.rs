//! ONNX stages of the `parakeet-tdt` model and the timed TDT greedy decode.
//!
//! ONNX tensor shapes use `i64` dimensions while Rust indexing needs `usize`.
//! These casts are safe because tensor dimensions are always small positive values.
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]

use lyrics_core::{ResultExt, TranscriptionError};
use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::model::Vocab;

/// TDT duration buckets: how many encoder frames to advance per step.
pub const DURATIONS: [usize; 5] = [0, 1, 2, 3, 4];

/// Width of each prediction-network LSTM state.
const STATE_DIM: usize = 640;

/// Tokens the joint may emit on one frame before decoding is forced ahead.
const MAX_SYMBOLS_PER_STEP: usize = 10;

/// A non-blank token and the encoder frame it was emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedToken {
    /// Vocabulary id.
    pub id: usize,
    /// Encoder frame index within the decoded window.
    pub frame: usize,
}

/// Greedy TDT decoding over encoder output `[T', hidden]`.
///
/// Each emitted token keeps the frame it was produced at, which the
/// segmenter turns into timestamps.
pub fn greedy_decode(
    encoder_out: &Array2<f32>,
    decoder_joint: &mut Session,
    vocab: &Vocab,
) -> Result<Vec<TimedToken>, TranscriptionError> {
    let time_steps = encoder_out.shape()[0];
    let hidden_dim = encoder_out.shape()[1];
    let logit_count = vocab.logit_count();

    let mut step: usize = 0;
    let mut tokens: Vec<TimedToken> = Vec::new();
    let mut prev_token = vocab.blank_idx;

    let mut state1_data = vec![0.0f32; STATE_DIM];
    let mut state2_data = vec![0.0f32; STATE_DIM];

    let max_steps = time_steps * (MAX_SYMBOLS_PER_STEP + 1);
    let mut total_steps = 0;
    let mut symbols_on_frame = 0;

    while step < time_steps {
        total_steps += 1;
        if total_steps > max_steps {
            debug!("TDT decode hit step limit at frame {step}/{time_steps}");
            break;
        }

        let frame: Vec<f32> = encoder_out.row(step).to_vec();
        let encoder_input = Tensor::from_array(([1i64, 1, hidden_dim as i64], frame))
            .inference("encoder frame tensor")?;
        let target = Tensor::from_array(([1i64, 1], vec![prev_token as i64]))
            .inference("target tensor")?;
        let target_length =
            Tensor::from_array(([1i64], vec![1i64])).inference("target_length tensor")?;
        let s1 = Tensor::from_array(([1i64, 1, STATE_DIM as i64], state1_data.clone()))
            .inference("state1 tensor")?;
        let s2 = Tensor::from_array(([1i64, 1, STATE_DIM as i64], state2_data.clone()))
            .inference("state2 tensor")?;

        let outputs = decoder_joint
            .run(ort::inputs![
                "encoder_outputs" => encoder_input,
                "targets" => target,
                "target_length" => target_length,
                "input_states_1" => s1,
                "input_states_2" => s2,
            ])
            .inference("decoder_joint run")?;

        let (_, logits) = outputs["outputs"]
            .try_extract_tensor::<f32>()
            .inference("extract logits")?;
        if logits.len() < logit_count + DURATIONS.len() {
            return Err(TranscriptionError::Inference(format!(
                "logits too short: {} < {} + {}",
                logits.len(),
                logit_count,
                DURATIONS.len()
            )));
        }
        let token = argmax(&logits[..logit_count]);
        let advance = DURATIONS[argmax(&logits[logit_count..logit_count + DURATIONS.len()])];

        // The prediction network only advances on emitted tokens.
        let emitted = token != vocab.blank_idx;
        if emitted {
            let (_, s1_data) = outputs["output_states_1"]
                .try_extract_tensor::<f32>()
                .inference("extract state1")?;
            state1_data = s1_data.to_vec();
            let (_, s2_data) = outputs["output_states_2"]
                .try_extract_tensor::<f32>()
                .inference("extract state2")?;
            state2_data = s2_data.to_vec();

            tokens.push(TimedToken { id: token, frame: step });
            prev_token = token;
        }

        step = next_frame(step, advance, emitted, &mut symbols_on_frame);
    }

    debug!(
        tokens = tokens.len(),
        frames = time_steps,
        "TDT greedy decode finished"
    );
    Ok(tokens)
}

/// Frame to decode next.
///
/// A token with zero duration keeps decoding on the same frame, up to
/// [`MAX_SYMBOLS_PER_STEP`] tokens. A blank with zero duration still moves
/// one frame.
fn next_frame(step: usize, advance: usize, emitted: bool, symbols_on_frame: &mut usize) -> usize {
    if emitted {
        *symbols_on_frame += 1;
    }
    if advance == 0 && emitted && *symbols_on_frame < MAX_SYMBOLS_PER_STEP {
        return step;
    }
    *symbols_on_frame = 0;
    step + advance.max(1)
}

/// Find the index of the maximum value in a slice.
fn argmax(slice: &[f32]) -> usize {
    slice
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map_or(0, |(i, _)| i)
}

/// Run the encoder model on mel features.
///
/// Input: mel features `[1, 128, T]`; output: `[T', hidden]` with the batch
/// dimension squeezed.
pub fn run_encoder(
    encoder: &mut Session,
    features: &Array3<f32>,
    features_len: i64,
) -> Result<Array2<f32>, TranscriptionError> {
    let shape = features.shape();
    let flat: Vec<f32> = features.iter().copied().collect();
    let audio_signal =
        Tensor::from_array(([shape[0] as i64, shape[1] as i64, shape[2] as i64], flat))
            .inference("encoder audio_signal tensor")?;
    let length =
        Tensor::from_array(([1i64], vec![features_len])).inference("encoder length tensor")?;

    let outputs = encoder
        .run(ort::inputs![
            "audio_signal" => audio_signal,
            "length" => length,
        ])
        .inference("encoder run")?;

    let (enc_shape, enc_data) = outputs["outputs"]
        .try_extract_tensor::<f32>()
        .inference("extract encoder output")?;
    let (_, enc_len_data) = outputs["encoded_lengths"]
        .try_extract_tensor::<i64>()
        .inference("extract encoded_lengths")?;

    // The export emits [1, H, T']; transpose into one row per frame.
    let hidden = enc_shape[1] as usize;
    let frames = enc_shape[2] as usize;
    let valid = enc_len_data
        .first()
        .map_or(frames, |&n| (n.max(0) as usize).min(frames));

    let out = Array2::from_shape_vec((hidden, frames), enc_data.to_vec())
        .inference("reshape encoder")?;
    Ok(out.t().slice(ndarray::s![..valid, ..]).to_owned())
}

/// Run the mel preprocessor on raw waveform samples.
///
/// Input: waveform `[1, N]` (16kHz mono f32); output: mel features `[1, 128, T]`.
pub fn run_preprocessor(
    preprocessor: &mut Session,
    samples: &[f32],
) -> Result<(Array3<f32>, i64), TranscriptionError> {
    let n = samples.len();
    let waveform =
        Tensor::from_array(([1i64, n as i64], samples.to_vec())).inference("waveform tensor")?;
    let waveform_lens =
        Tensor::from_array(([1i64], vec![n as i64])).inference("waveform_lens tensor")?;

    let outputs = preprocessor
        .run(ort::inputs![
            "waveforms" => waveform,
            "waveforms_lens" => waveform_lens,
        ])
        .inference("preprocessor run")?;

    let (feat_shape, feat_data) = outputs["features"]
        .try_extract_tensor::<f32>()
        .inference("extract features")?;
    let (_, feat_len_data) = outputs["features_lens"]
        .try_extract_tensor::<i64>()
        .inference("extract features_lens")?;
    let feat_len = feat_len_data.first().copied().unwrap_or_default();

    let out = Array3::from_shape_vec(
        (
            feat_shape[0] as usize,
            feat_shape[1] as usize,
            feat_shape[2] as usize,
        ),
        feat_data.to_vec(),
    )
    .inference("reshape features")?;

    Ok((out, feat_len))
}
