//! Expansion of command-line inputs into audio files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lyrics_settings::BatchSettings;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Expand `inputs` into a sorted, duplicate-free list of audio files.
///
/// Directories are walked recursively and filtered by
/// [`BatchSettings::input_extensions`]. Anything else is taken as given, so a
/// missing or oddly named file still becomes a job and reports its own error.
pub fn collect_inputs(inputs: &[PathBuf], batch: &BatchSettings) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            let before = files.len();
            walk_dir(input, batch, &mut files);
            debug!(
                dir = %input.display(),
                found = files.len() - before,
                "scanned input directory"
            );
        } else {
            let _ = files.insert(input.clone());
        }
    }
    files.into_iter().collect()
}

fn walk_dir(dir: &Path, batch: &BatchSettings, files: &mut BTreeSet<PathBuf>) {
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let accepted = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| batch.accepts_extension(ext));
        if accepted {
            let _ = files.insert(entry.into_path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn walks_directories_recursively_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.mp3"));
        touch(&root.join("a.FLAC"));
        touch(&root.join("notes.txt"));
        touch(&root.join("b.lrc"));
        touch(&root.join("disc2/c.ogg"));

        let files = collect_inputs(&[root.to_path_buf()], &BatchSettings::default());
        assert_eq!(
            files,
            vec![
                root.join("a.FLAC"),
                root.join("b.mp3"),
                root.join("disc2/c.ogg"),
            ]
        );
    }

    #[test]
    fn explicit_files_are_kept_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("song.mp3"));
        let odd = root.join("voice.memo");
        touch(&odd);

        let files = collect_inputs(
            &[root.join("song.mp3"), odd.clone(), root.to_path_buf()],
            &BatchSettings::default(),
        );
        assert_eq!(files, vec![root.join("song.mp3"), odd]);
    }

    #[test]
    fn missing_file_is_passed_through() {
        let missing = PathBuf::from("/definitely/not/here.mp3");
        let files = collect_inputs(std::slice::from_ref(&missing), &BatchSettings::default());
        assert_eq!(files, vec![missing]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_inputs(&[dir.path().to_path_buf()], &BatchSettings::default()).is_empty());
    }
}
