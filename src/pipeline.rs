use crate::audio::{
    chunk_file_name, detect_silence, plan_chunks, AudioAnalyzer, AudioBuffer, AudioExtractor,
    ChunkExporter, ChunkInterval, DurationProbe, FfmpegTools, WavBuffer,
};
use crate::config::SplitConfig;
use crate::error::{Result, SplitError};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// What happened to one planned chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum ChunkStatus {
    Written,
    Failed(String),
    /// Never started because the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    pub index: usize,
    pub interval: ChunkInterval,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: ChunkStatus,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
}

/// Timing and counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct SplitStats {
    #[serde(serialize_with = "as_secs")]
    pub total_time: Duration,
    #[serde(serialize_with = "as_secs")]
    pub planning_time: Duration,
    #[serde(serialize_with = "as_secs")]
    pub export_time: Duration,
    pub silence_markers: usize,
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Per-chunk results of a run, ordered by chunk index.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub audio_duration: f64,
    pub intervals: Vec<ChunkInterval>,
    pub outcomes: Vec<ChunkOutcome>,
    pub stats: SplitStats,
}

impl SplitReport {
    /// True only when every planned chunk was written.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == ChunkStatus::Written)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChunkStatus::Failed(_)))
    }

    /// Collapse the report into an error naming the first failed chunk.
    pub fn ensure_success(&self) -> Result<()> {
        if let Some(outcome) = self.failures().next() {
            let message = match &outcome.status {
                ChunkStatus::Failed(msg) => msg.clone(),
                _ => String::new(),
            };
            return Err(SplitError::Export {
                index: outcome.index,
                message: format!("{} ({} chunk(s) failed)", message, self.stats.failed),
            });
        }
        if self.stats.skipped > 0 {
            return Err(SplitError::Cancelled);
        }
        Ok(())
    }

    /// Write this report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Detects silence, plans chunks and exports them over a bounded worker pool.
pub struct SplitPipeline {
    analyzer: Arc<dyn AudioAnalyzer>,
    extractor: Arc<dyn AudioExtractor>,
    probe: Arc<dyn DurationProbe>,
    buffer: Arc<dyn AudioBuffer>,
    show_progress: bool,
    cancelled: Arc<AtomicBool>,
}

impl SplitPipeline {
    pub fn new(
        analyzer: Arc<dyn AudioAnalyzer>,
        extractor: Arc<dyn AudioExtractor>,
        probe: Arc<dyn DurationProbe>,
        buffer: Arc<dyn AudioBuffer>,
    ) -> Self {
        Self {
            analyzer,
            extractor,
            probe,
            buffer,
            show_progress: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire every capability to the given ffmpeg/ffprobe binaries.
    pub fn with_ffmpeg(tools: FfmpegTools) -> Self {
        let buffer = Arc::new(WavBuffer::new(tools.ffmpeg_path()));
        let tools = Arc::new(tools);
        Self::new(tools.clone(), tools.clone(), tools, buffer)
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Share a flag that, once set, stops chunks that have not started yet.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Probe, detect and plan. Returns the file duration, marker count and intervals.
    pub async fn plan(
        &self,
        audio: &Path,
        config: &SplitConfig,
    ) -> Result<(f64, usize, Vec<ChunkInterval>)> {
        let duration = self.probe.duration(audio).await?;
        let timestamps = detect_silence(
            self.analyzer.as_ref(),
            audio,
            config.silence_threshold_db,
            config.silence_gap,
        )
        .await?;
        let intervals = plan_chunks(
            &timestamps,
            config.min_length,
            config.max_length,
            duration,
        );
        Ok((duration, timestamps.len(), intervals))
    }

    /// Split `audio` into `output_dir/chunk_<n>.wav`.
    ///
    /// Detection or planning failures return `Err` before anything is exported.
    /// Export failures are recorded per chunk in the report and never cancel
    /// sibling chunks unless `config.fail_fast` is set.
    pub async fn run(
        &self,
        audio: &Path,
        output_dir: &Path,
        config: &SplitConfig,
    ) -> Result<SplitReport> {
        let start_time = Instant::now();
        config.validate()?;

        if !audio.exists() {
            return Err(SplitError::FileNotFound(audio.display().to_string()));
        }

        fs::create_dir_all(output_dir)?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 1: Silence detection and planning
        // ═══════════════════════════════════════════════════════════════════
        info!("Stage 1/2: Detecting silence in {}", audio.display());
        let (audio_duration, silence_markers, intervals) = self.plan(audio, config).await?;
        let planning_time = start_time.elapsed();

        info!(
            "Planned {} chunks over {:.2}s of audio in {:.2}s",
            intervals.len(),
            audio_duration,
            planning_time.as_secs_f64()
        );

        // ═══════════════════════════════════════════════════════════════════
        // Stage 2: Export
        // ═══════════════════════════════════════════════════════════════════
        info!(
            "Stage 2/2: Exporting {} chunks (workers: {})",
            intervals.len(),
            config.workers
        );
        let export_start = Instant::now();
        let outcomes = self
            .export_all(audio, output_dir, audio_duration, &intervals, config)
            .await;
        let export_time = export_start.elapsed();

        let count = |f: fn(&ChunkStatus) -> bool| outcomes.iter().filter(|o| f(&o.status)).count();
        let stats = SplitStats {
            total_time: start_time.elapsed(),
            planning_time,
            export_time,
            silence_markers,
            written: count(|s| *s == ChunkStatus::Written),
            failed: count(|s| matches!(s, ChunkStatus::Failed(_))),
            skipped: count(|s| *s == ChunkStatus::Skipped),
        };

        info!(
            "Export complete: {}/{} chunks written in {:.2}s",
            stats.written,
            outcomes.len(),
            export_time.as_secs_f64()
        );

        Ok(SplitReport {
            source: audio.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            audio_duration,
            intervals,
            outcomes,
            stats,
        })
    }

    async fn export_all(
        &self,
        audio: &Path,
        output_dir: &Path,
        audio_duration: f64,
        intervals: &[ChunkInterval],
        config: &SplitConfig,
    ) -> Vec<ChunkOutcome> {
        let exporter = ChunkExporter::new(self.extractor.clone(), self.buffer.clone(), config.pad);

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(intervals.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        // Use semaphore to bound concurrent exports
        let semaphore = Arc::new(Semaphore::new(config.workers));
        let mut futures = FuturesUnordered::new();

        for interval in intervals.iter().copied() {
            let sem = semaphore.clone();
            let exporter = exporter.clone();
            let cancelled = self.cancelled.clone();
            let pb = progress_bar.clone();
            let fail_fast = config.fail_fast;
            let path = output_dir.join(chunk_file_name(interval.index));

            let future = async move {
                let permit = sem.acquire().await;
                let chunk_start = Instant::now();

                if permit.is_err() || cancelled.load(Ordering::Relaxed) {
                    debug!("Skipping chunk {}", interval.index);
                    return ChunkOutcome {
                        index: interval.index,
                        interval,
                        path,
                        status: ChunkStatus::Skipped,
                        elapsed: Duration::ZERO,
                    };
                }

                debug!(
                    "Starting chunk {} ({:.3}s..{:.3}s)",
                    interval.index, interval.start, interval.end
                );
                let result = exporter
                    .export(audio, &interval, audio_duration, &path)
                    .await;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                let status = match result {
                    Ok(_) => ChunkStatus::Written,
                    Err(e) => {
                        warn!("Chunk {} failed: {}", interval.index, e);
                        if fail_fast {
                            cancelled.store(true, Ordering::Relaxed);
                        }
                        ChunkStatus::Failed(e.to_string())
                    }
                };

                ChunkOutcome {
                    index: interval.index,
                    interval,
                    path,
                    status,
                    elapsed: chunk_start.elapsed(),
                }
            };

            futures.push(future);
        }

        let mut outcomes = Vec::with_capacity(intervals.len());
        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Export complete");
        }

        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

/// Split `audio` with ffmpeg/ffprobe from PATH.
pub async fn split_audio(
    audio: &Path,
    output_dir: &Path,
    config: &SplitConfig,
) -> Result<SplitReport> {
    SplitPipeline::with_ffmpeg(FfmpegTools::default())
        .run(audio, output_dir, config)
        .await
}

/// Print a summary of the run.
pub fn print_summary(report: &SplitReport) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                        Audio Split Complete                    ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Source:     {}", report.source.display());
    println!("  Output:     {}", report.output_dir.display());
    println!("  Duration:   {:.1}s audio", report.audio_duration);
    println!("  Markers:    {}", report.stats.silence_markers);
    println!(
        "  Chunks:     {} written, {} failed, {} skipped",
        report.stats.written, report.stats.failed, report.stats.skipped
    );
    println!();
    println!("  Timing:");
    println!(
        "    Plan:        {:.2}s",
        report.stats.planning_time.as_secs_f64()
    );
    println!(
        "    Export:      {:.2}s",
        report.stats.export_time.as_secs_f64()
    );
    println!(
        "    Total:       {:.2}s",
        report.stats.total_time.as_secs_f64()
    );
    for outcome in report.failures() {
        if let ChunkStatus::Failed(ref msg) = outcome.status {
            println!();
            println!("  Failed: {} - {}", outcome.path.display(), msg);
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
