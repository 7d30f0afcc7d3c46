//! Audio decoding and resampling to 16kHz mono f32.

use std::fs::File;
use std::path::Path;

use lyrics_core::{AudioDecoder, Pcm, ResultExt, TARGET_SAMPLE_RATE, TranscriptionError};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument};

/// Resampler input block size.
const RESAMPLE_CHUNK: usize = 1024;

/// [`AudioDecoder`] backed by symphonia and rubato.
///
/// Supports every container/codec compiled into symphonia (mp3, wav, flac,
/// ogg/vorbis, m4a/aac). Output is mixed down to mono and resampled to
/// [`TARGET_SAMPLE_RATE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> Result<Pcm, TranscriptionError> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        let samples = decode_source(Box::new(file), extension)?;
        Ok(Pcm::new(samples, TARGET_SAMPLE_RATE))
    }
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> Result<Vec<f32>, TranscriptionError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        let _ = hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .audio_decode("probe failed")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| TranscriptionError::AudioDecode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let source_rate = codec_params.sample_rate.unwrap_or(TARGET_SAMPLE_RATE);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .audio_decode("codec init failed")?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TranscriptionError::AudioDecode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt frame is recoverable; the rest of the stream still decodes.
            Err(SymphoniaError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(TranscriptionError::AudioDecode(format!("decode: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let n_frames = decoded.capacity();
        let mut sample_buf = SampleBuffer::<f32>::new(n_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            #[allow(clippy::cast_precision_loss)]
            let scale = channels as f32;
            for chunk in samples.chunks(channels) {
                all_samples.push(chunk.iter().sum::<f32>() / scale);
            }
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if skipped_packets > 0 {
        debug!(skipped_packets, "skipped undecodable packets");
    }

    if all_samples.is_empty() {
        return Err(TranscriptionError::AudioDecode(
            "no audio samples decoded".into(),
        ));
    }

    if source_rate != TARGET_SAMPLE_RATE {
        all_samples = resample(&all_samples, source_rate, TARGET_SAMPLE_RATE)?;
    }

    debug!(
        source_rate,
        samples = all_samples.len(),
        "decoded audio to {TARGET_SAMPLE_RATE}Hz mono"
    );
    Ok(all_samples)
}

/// Resample mono audio from `from_rate` to `to_rate` using rubato.
///
/// The resampler's group delay is dropped and the tail flushed, so the output
/// holds exactly `ceil(len * to_rate / from_rate)` samples.
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, TranscriptionError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let expected = (samples.len() as u64 * u64::from(to_rate)).div_ceil(u64::from(from_rate)) as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| TranscriptionError::Resample(format!("init: {e}")))?;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut push_chunk = |chunk: &[f32], output: &mut Vec<f32>| -> Result<(), TranscriptionError> {
        let mut padded = chunk.to_vec();
        padded.resize(RESAMPLE_CHUNK, 0.0);
        let resampled = resampler
            .process(&[padded], None)
            .map_err(|e| TranscriptionError::Resample(format!("process: {e}")))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
        Ok(())
    };

    for chunk in samples.chunks(RESAMPLE_CHUNK) {
        push_chunk(chunk, &mut output)?;
    }
    // Flush the samples still held back by the filter delay.
    let mut flushes = 0;
    while output.len() < delay + expected && flushes < 8 {
        push_chunk(&[], &mut output)?;
        flushes += 1;
    }

    let end = (delay + expected).min(output.len());
    Ok(output[delay.min(end)..end].to_vec())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn decode_audio(data: &[u8], extension: Option<&str>) -> Result<Vec<f32>, TranscriptionError> {
        decode_source(Box::new(Cursor::new(data.to_vec())), extension)
    }

    #[test]
    fn decode_invalid_audio_returns_error() {
        let result = decode_audio(b"not audio data", Some("wav"));
        assert!(result.is_err());
    }

    #[test]
    fn decode_empty_returns_error() {
        let result = decode_audio(b"", Some("wav"));
        assert!(result.is_err());
    }

    #[test]
    fn resample_identity() {
        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 / 16000.0).sin()).collect();
        let result = resample(&samples, 16000, 16000).unwrap();
        assert_eq!(result.len(), samples.len());
    }

    #[test]
    fn resample_downsample() {
        // 48kHz → 16kHz should produce 1/3 the samples
        let samples: Vec<f32> = (0..48000).map(|i| (i as f32 / 48000.0).sin()).collect();
        let result = resample(&samples, 48000, 16000).unwrap();
        assert_eq!(result.len(), 16000);
    }

    #[test]
    fn decode_wav_synthetic() {
        // 16kHz mono 16-bit, 0.1s of silence
        let wav = generate_test_wav(16000, 1, 1600);
        let samples = decode_audio(&wav, Some("wav")).unwrap();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn decode_wav_44khz_resamples_to_16khz() {
        // 44.1kHz stereo, 0.5s
        let wav = generate_test_wav(44100, 2, 22050);
        let samples = decode_audio(&wav, None).unwrap();
        assert_eq!(samples.len(), 8000);
    }

    #[test]
    fn decoder_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, generate_test_wav(16000, 1, 3200)).unwrap();

        let pcm = SymphoniaDecoder.decode(&path).unwrap();
        assert_eq!(pcm.sample_rate(), TARGET_SAMPLE_RATE);
        assert_eq!(pcm.duration(), std::time::Duration::from_millis(200));
    }

    #[test]
    fn decoder_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SymphoniaDecoder
            .decode(&dir.path().join("missing.mp3"))
            .unwrap_err();
        assert_matches::assert_matches!(err, TranscriptionError::Io(_));
    }

    /// Generate a minimal valid WAV file for testing.
    fn generate_test_wav(sample_rate: u32, channels: u16, num_samples: u32) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
        let block_align = channels * bits_per_sample / 8;
        let data_size = num_samples * u32::from(channels) * u32::from(bits_per_sample) / 8;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(file_size as usize + 8);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        buf.resize(buf.len() + data_size as usize, 0);
        buf
    }
}
