//! # lyrics-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LyricsSettings::default()`]
//! 2. **User file**: `~/.lyrics/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LYRICS_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Usage
//!
//! ```no_run
//! let path = lyrics_settings::settings_path();
//! let settings = lyrics_settings::load_settings_from_path(&path)?;
//! println!("decode slots: {}", settings.batch.decode_concurrency);
//! # Ok::<(), lyrics_settings::SettingsError>(())
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
