use anyhow::{Context, Result};
use clap::Parser;
use silence_split::audio::FfmpegTools;
use silence_split::config::{Config, SplitConfig};
use silence_split::{interactive, print_summary, SplitPipeline};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "silence-split")]
#[command(version, about = "Split audio into chunks with adjustable parameters.")]
#[command(
    long_about = "Split an audio file into chunks cut at detected silences, bounded by minimum and maximum lengths, with silence padding at both ends of every chunk."
)]
struct Cli {
    /// Path to the input audio file
    #[arg(required_unless_present = "interactive")]
    audio_path: Option<PathBuf>,

    /// Directory to save the output audio chunks
    #[arg(required_unless_present = "interactive")]
    output_path: Option<PathBuf>,

    /// Minimum length of each chunk in seconds
    #[arg(long = "min_length", visible_alias = "min-length")]
    min_length: Option<f64>,

    /// Maximum length of each chunk in seconds
    #[arg(long = "max_length", visible_alias = "max-length")]
    max_length: Option<f64>,

    /// Silence threshold in dB
    #[arg(long = "silence_thresh", visible_alias = "silence-thresh", allow_negative_numbers = true)]
    silence_thresh: Option<f64>,

    /// Duration of silence added to the beginning and end of each chunk in milliseconds
    #[arg(long = "silence_duration", visible_alias = "silence-duration")]
    silence_duration: Option<u64>,

    /// Maximum number of chunks exported in parallel
    #[arg(long = "max_workers", visible_alias = "max-workers")]
    max_workers: Option<usize>,

    /// Skip chunks that have not started once any chunk fails
    #[arg(long)]
    fail_fast: bool,

    /// Write a JSON report of every chunk's outcome to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Prompt for every parameter instead of reading arguments
    #[arg(short, long)]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Layer command-line overrides on top of the loaded defaults.
fn resolve_config(cli: &Cli, config: &Config) -> SplitConfig {
    let mut split = config.split_config();
    if let Some(v) = cli.min_length {
        split.min_length = v;
    }
    if let Some(v) = cli.max_length {
        split.max_length = v;
    }
    if let Some(v) = cli.silence_thresh {
        split.silence_threshold_db = v;
    }
    if let Some(v) = cli.silence_duration {
        split.pad = Duration::from_millis(v);
    }
    if let Some(v) = cli.max_workers {
        split.workers = v;
    }
    split.fail_fast = cli.fail_fast;
    split
}

fn print_parameters(audio: &std::path::Path, output: &std::path::Path, split: &SplitConfig) {
    println!("Splitting audio with the following parameters:");
    println!("Input audio path: {}", audio.display());
    println!("Output path: {}", output.display());
    println!("Minimum chunk length: {} seconds", split.min_length);
    println!("Maximum chunk length: {} seconds", split.max_length);
    println!("Silence threshold: {} dB", split.silence_threshold_db);
    println!("Silence duration: {} milliseconds", split.pad.as_millis());
    println!("Maximum workers: {}", split.workers);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;

    if cli.interactive {
        return interactive::run_interactive(&config).await;
    }

    let (Some(audio), Some(output)) = (cli.audio_path.clone(), cli.output_path.clone()) else {
        anyhow::bail!("Both audio_path and output_path are required");
    };

    if !audio.exists() {
        anyhow::bail!("Input file not found: {}", audio.display());
    }

    let split = resolve_config(&cli, &config);
    split.validate().context("Configuration validation failed")?;

    print_parameters(&audio, &output, &split);

    let tools = FfmpegTools::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
    tools
        .check()
        .context("FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)")?;

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, finishing chunks already in progress");
            cancelled.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let report = SplitPipeline::with_ffmpeg(tools)
        .with_progress(!cli.no_progress)
        .with_cancel_flag(cancelled)
        .run(&audio, &output, &split)
        .await
        .context("Audio split failed")?;

    if let Some(ref path) = cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    print_summary(&report);

    report
        .ensure_success()
        .context("Not every chunk was written; inspect the output directory")?;

    Ok(())
}
