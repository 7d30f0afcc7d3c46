//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LyricsSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `LYRICS_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{DecodeSlotRelease, LogLevel, LyricsSettings};

/// Upper bound accepted for either concurrency override.
const MAX_CONCURRENCY: usize = 256;

/// Resolve the path to the settings file (`~/.lyrics/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".lyrics").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value rejected by
/// [`LyricsSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LyricsSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<LyricsSettings> {
    let defaults = serde_json::to_value(LyricsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LyricsSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LYRICS_*` overrides read through `env`.
///
/// Invalid values are logged and ignored (falling back to file/default).
fn apply_overrides(settings: &mut LyricsSettings, env: impl Fn(&str) -> Option<String>) {
    let env = EnvReader(env);

    if let Some(v) = env.string("LYRICS_MODEL_DIR") {
        settings.model_dir = Some(v);
    }
    if let Some(v) = env.usize("LYRICS_DECODE_CONCURRENCY", 1, MAX_CONCURRENCY) {
        settings.batch.decode_concurrency = v;
    }
    if let Some(v) = env.usize("LYRICS_INFER_CONCURRENCY", 1, MAX_CONCURRENCY) {
        settings.batch.infer_concurrency = v;
    }
    if let Some(v) = env.bool("LYRICS_RELEASE_DECODE_EARLY") {
        settings.batch.decode_slot_release = if v {
            DecodeSlotRelease::ReleaseAfterDecode
        } else {
            DecodeSlotRelease::HoldUntilDone
        };
    }
    if let Some(v) = env.log_level("LYRICS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("LYRICS_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log level name (case-insensitive).
pub fn parse_log_level(val: &str) -> Option<LogLevel> {
    serde_json::from_value(Value::String(val.to_lowercase())).ok()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.0)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.0)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }

    fn log_level(&self, name: &str) -> Option<LogLevel> {
        let val = (self.0)(name)?;
        let result = parse_log_level(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid log level env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
