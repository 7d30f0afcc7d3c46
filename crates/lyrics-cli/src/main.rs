//! # lyrics
//!
//! Batch transcriber binary: wires settings, the ONNX engine and the dual-gate
//! scheduler together and writes a `.lrc` file next to every input.

#![deny(unsafe_code)]

mod discovery;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use lyrics_batch::{
    BatchReport, DecodeSlotPolicy, Job, Scheduler, SchedulerConfig, ThroughputTracker,
};
use lyrics_core::{AudioDecoder, TranscriptionEngine};
use lyrics_settings::loader::{parse_log_level, parse_usize_range};
use lyrics_settings::{BatchSettings, DecodeSlotRelease, LogLevel, LyricsSettings};
use lyrics_transcription::{ParakeetEngine, SymphoniaDecoder};
use tracing::{error, info, warn};

/// Exit status for failures before any file was processed.
const STARTUP_FAILURE: u8 = 2;

/// Transcribe audio files into timestamped `.lrc` lyrics.
#[derive(Parser, Debug)]
#[command(name = "lyrics", version, about = "Transcribe audio files into timestamped .lrc lyrics")]
struct Cli {
    /// Audio files or directories to scan.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory holding the ONNX model export (overrides `modelDir`).
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Files decoded or waiting for inference at once.
    #[arg(long, value_parser = parse_capacity)]
    decode_concurrency: Option<usize>,

    /// Files on the inference engine at once.
    #[arg(long, value_parser = parse_capacity)]
    infer_concurrency: Option<usize>,

    /// Release the decode slot as soon as a file is decoded.
    #[arg(long)]
    release_decode_early: bool,

    /// Settings file (defaults to `~/.lyrics/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply_to(&self, settings: &mut LyricsSettings) {
        if let Some(dir) = &self.model_dir {
            settings.model_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(n) = self.decode_concurrency {
            settings.batch.decode_concurrency = n;
        }
        if let Some(n) = self.infer_concurrency {
            settings.batch.infer_concurrency = n;
        }
        if self.release_decode_early {
            settings.batch.decode_slot_release = DecodeSlotRelease::ReleaseAfterDecode;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn parse_capacity(val: &str) -> std::result::Result<usize, String> {
    parse_usize_range(val, 1, 256).ok_or_else(|| format!("expected 1..=256, got `{val}`"))
}

fn parse_level(val: &str) -> std::result::Result<LogLevel, String> {
    parse_log_level(val).ok_or_else(|| format!("unknown log level `{val}`"))
}

fn scheduler_config(batch: &BatchSettings) -> SchedulerConfig {
    SchedulerConfig {
        decode_capacity: batch.decode_concurrency,
        infer_capacity: batch.infer_concurrency,
        decode_slot_policy: match batch.decode_slot_release {
            DecodeSlotRelease::HoldUntilDone => DecodeSlotPolicy::HoldUntilDone,
            DecodeSlotRelease::ReleaseAfterDecode => DecodeSlotPolicy::ReleaseAfterDecode,
        },
    }
}

fn load_settings(cli: &Cli) -> Result<LyricsSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(lyrics_settings::settings_path);
    let mut settings = lyrics_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply_to(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

async fn run(cli: Cli) -> Result<BatchReport> {
    let settings = load_settings(&cli)?;
    logging::init_subscriber(
        settings.logging.level.as_filter_str(),
        settings.logging.json,
    );

    let model_dir = settings
        .model_dir
        .as_deref()
        .map(PathBuf::from)
        .context("No model directory: pass --model-dir or set modelDir in settings")?;

    let files = discovery::collect_inputs(&cli.inputs, &settings.batch);
    if files.is_empty() {
        bail!("No audio files found in the given inputs");
    }
    info!(files = files.len(), "collected input files");

    let engine: Arc<dyn TranscriptionEngine> = ParakeetEngine::new(model_dir)
        .await
        .context("Failed to load transcription model")?;
    let decoder: Arc<dyn AudioDecoder> = Arc::new(SymphoniaDecoder);
    let scheduler = Scheduler::new(scheduler_config(&settings.batch), decoder, engine);

    let cancel = scheduler.cancel_token();
    let _interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling queued files");
            cancel.cancel();
        }
    });

    let jobs = files.into_iter().map(Job::new).collect();
    let throughput = Arc::new(ThroughputTracker::start());
    let report = scheduler.run_batch(jobs, &throughput).await;

    for (path, err) in report.failures() {
        error!(file = %path.display(), error = %err, "failed");
    }
    info!(
        "{} written, {} skipped, {} failed; {:.1}s of audio in {:.1}s ({:.2}x)",
        report.written(),
        report.skipped(),
        report.failed(),
        report.total_audio.as_secs_f64(),
        report.elapsed.as_secs_f64(),
        report.rate()
    );
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)),
        Err(e) => {
            eprintln!("lyrics: {e:#}");
            ExitCode::from(STARTUP_FAILURE)
        }
    }
}
