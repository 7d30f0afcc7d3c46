//! Lyric file formatting and persistence.
//!
//! One line per segment: `[MM:SS.ff]text`. Minutes count the whole offset,
//! so an hour in reads `60:00.00` rather than wrapping back to `00:00.00` as
//! an `mm` time-of-day format would. Hundredths are truncated.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lyrics_core::Segment;

/// Extension of generated lyric files.
pub const LYRICS_EXTENSION: &str = "lrc";

/// Sibling lyric path for `source`: same directory and stem, `.lrc` extension.
pub fn destination_for(source: &Path) -> PathBuf {
    source.with_extension(LYRICS_EXTENSION)
}

/// Format an offset as `MM:SS.ff`.
pub fn format_timestamp(offset: Duration) -> String {
    let millis = offset.as_millis();
    let minutes = millis / 60_000;
    let seconds = (millis / 1000) % 60;
    let hundredths = (millis / 10) % 100;
    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// Format one segment as a lyric line (without line terminator).
pub fn format_segment(segment: &Segment) -> String {
    format!(
        "[{}]{}",
        format_timestamp(segment.start),
        segment.text.trim()
    )
}

/// Render segments in the order given, one `\n`-terminated line each.
pub fn render(segments: &[Segment]) -> String {
    segments.iter().fold(String::new(), |mut out, segment| {
        let _ = writeln!(out, "{}", format_segment(segment));
        out
    })
}

/// Write `contents` to `destination` without ever exposing a partial file.
///
/// The text goes to a temporary file in the destination directory which is
/// then linked into place. An existing destination is never overwritten;
/// that case fails with [`std::io::ErrorKind::AlreadyExists`].
pub fn write_lyrics(destination: &Path, contents: &str) -> std::io::Result<()> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".lyrics-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    let _ = tmp.persist_noclobber(destination).map_err(|e| e.error)?;
    Ok(())
}
