//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may name only the keys it changes.

mod batch;
mod logging;

pub use batch::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// Loaded from `~/.lyrics/settings.json` with defaults applied for missing
/// fields. Example:
///
/// ```json
/// {
///   "modelDir": "/models/parakeet-tdt-0.6b",
///   "batch": { "decodeConcurrency": 8, "decodeSlotRelease": "releaseAfterDecode" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LyricsSettings {
    /// Directory holding the ONNX model export. The CLI argument wins over this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    /// Scheduling limits and input discovery.
    pub batch: BatchSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl LyricsSettings {
    /// Reject values no batch can run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch.decode_concurrency == 0 {
            return Err(SettingsError::InvalidValue(
                "batch.decodeConcurrency must be at least 1".into(),
            ));
        }
        if self.batch.infer_concurrency == 0 {
            return Err(SettingsError::InvalidValue(
                "batch.inferConcurrency must be at least 1".into(),
            ));
        }
        if self.batch.input_extensions.is_empty() {
            return Err(SettingsError::InvalidValue(
                "batch.inputExtensions must not be empty".into(),
            ));
        }
        Ok(())
    }
}
