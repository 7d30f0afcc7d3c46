//! Grouping timed SentencePiece tokens into lyric segments.

use std::time::Duration;

use lyrics_core::Segment;

/// Duration covered by one encoder frame (10ms hop, 8x subsampling).
pub const FRAME_DURATION: Duration = Duration::from_millis(80);

/// SentencePiece word-boundary marker.
const WORD_MARKER: char = '\u{2581}';

/// Silence between words that starts a new segment.
const MAX_GAP_FRAMES: usize = 10;

/// Longest segment before it is cut at the next word boundary.
const MAX_SEGMENT_FRAMES: usize = 150;

/// A decoded piece of text and its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPiece {
    /// Raw SentencePiece text, possibly starting with `▁`.
    pub text: String,
    /// Encoder frame index within the window.
    pub frame: usize,
}

fn frame_offset(frame: usize) -> Duration {
    FRAME_DURATION * u32::try_from(frame).unwrap_or(u32::MAX)
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '?', '!'])
}

/// Split `pieces` into segments and shift them by `offset`.
///
/// A segment closes after sentence-final punctuation, before a word that
/// follows a silence of at least [`MAX_GAP_FRAMES`], or before a word once the
/// segment spans [`MAX_SEGMENT_FRAMES`]. Empty segments are dropped.
pub fn segment_pieces(pieces: &[TimedPiece], offset: Duration) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut first_frame = 0usize;
    let mut last_frame = 0usize;

    let mut flush = |text: &mut String, first: usize, last: usize| {
        let line = text.trim();
        if !line.is_empty() {
            segments.push(Segment::new(
                offset + frame_offset(first),
                offset + frame_offset(last + 1),
                line,
            ));
        }
        text.clear();
    };

    for piece in pieces {
        let starts_word = piece.text.starts_with(WORD_MARKER);
        if !text.is_empty() && starts_word {
            let gap = piece.frame.saturating_sub(last_frame);
            let span = piece.frame.saturating_sub(first_frame);
            if gap >= MAX_GAP_FRAMES || span >= MAX_SEGMENT_FRAMES {
                flush(&mut text, first_frame, last_frame);
            }
        }

        if text.is_empty() {
            first_frame = piece.frame;
        }
        text.push_str(&piece.text.replace(WORD_MARKER, " "));
        last_frame = piece.frame;

        if ends_sentence(&piece.text) {
            flush(&mut text, first_frame, last_frame);
        }
    }
    flush(&mut text, first_frame, last_frame);

    segments
}
