//! Batch scheduling settings.

use serde::{Deserialize, Serialize};

/// When a job gives back its decode slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodeSlotRelease {
    /// Hold the slot until the lyric file is written.
    #[default]
    HoldUntilDone,
    /// Release the slot as soon as decoding finishes.
    ReleaseAfterDecode,
}

/// Gate capacities and input discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchSettings {
    /// Files decoded or waiting for inference at once.
    pub decode_concurrency: usize,
    /// Files on the inference engine at once.
    pub infer_concurrency: usize,
    /// Decode slot release policy.
    pub decode_slot_release: DecodeSlotRelease,
    /// Extensions (without dot, case-insensitive) collected when walking directories.
    pub input_extensions: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            decode_concurrency: 4,
            infer_concurrency: 1,
            decode_slot_release: DecodeSlotRelease::HoldUntilDone,
            input_extensions: ["mp3", "wav", "flac", "ogg", "m4a", "aac"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl BatchSettings {
    /// Whether `ext` is one of [`Self::input_extensions`].
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.input_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_policy_wire_names() {
        assert_eq!(
            serde_json::to_string(&DecodeSlotRelease::ReleaseAfterDecode).unwrap(),
            "\"releaseAfterDecode\""
        );
        let parsed: DecodeSlotRelease = serde_json::from_str("\"holdUntilDone\"").unwrap();
        assert_eq!(parsed, DecodeSlotRelease::HoldUntilDone);
    }

    #[test]
    fn extension_match_ignores_case_and_dot() {
        let mut batch = BatchSettings::default();
        assert!(batch.accepts_extension("MP3"));
        assert!(!batch.accepts_extension("txt"));
        batch.input_extensions = vec![".opus".into()];
        assert!(batch.accepts_extension("opus"));
    }
}
