use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SplitError};

use super::{AudioAnalyzer, AudioExtractor, DurationProbe};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg(ffmpeg: &Path) -> Result<()> {
    let output = Command::new(ffmpeg)
        .arg("-version")
        .output()
        .map_err(|e| {
            SplitError::ExternalTool(format!(
                "FFmpeg not found at '{}'. Please install FFmpeg and ensure it's in your PATH. Error: {e}",
                ffmpeg.display()
            ))
        })?;

    if !output.status.success() {
        return Err(SplitError::ExternalTool("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe(ffprobe: &Path) -> Result<()> {
    let output = Command::new(ffprobe)
        .arg("-version")
        .output()
        .map_err(|e| {
            SplitError::ExternalTool(format!(
                "FFprobe not found at '{}'. Please install FFmpeg (includes FFprobe). Error: {e}",
                ffprobe.display()
            ))
        })?;

    if !output.status.success() {
        return Err(SplitError::ExternalTool("FFprobe check failed".to_string()));
    }

    debug!("FFprobe is available");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Pull `format.duration` out of `ffprobe -print_format json -show_format` output.
fn parse_probe_duration(json: &str) -> Result<f64> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let raw = probe
        .format
        .duration
        .ok_or_else(|| SplitError::Parse("ffprobe reported no duration".to_string()))?;

    raw.trim()
        .parse::<f64>()
        .map_err(|e| SplitError::Parse(format!("Failed to parse duration '{raw}': {e}")))
}

/// Format seconds the way ffmpeg's time options accept them.
fn format_seconds(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

/// ffmpeg/ffprobe-backed analyzer, extractor and duration probe.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Verify both binaries can be launched.
    pub fn check(&self) -> Result<()> {
        check_ffmpeg(&self.ffmpeg)?;
        check_ffprobe(&self.ffprobe)
    }
}

#[async_trait]
impl AudioAnalyzer for FfmpegTools {
    async fn silence_report(
        &self,
        audio: &Path,
        threshold_db: f64,
        min_silence: Duration,
    ) -> Result<String> {
        if !audio.exists() {
            return Err(SplitError::FileNotFound(audio.display().to_string()));
        }

        let filter = format!(
            "silencedetect=noise={}dB:d={}",
            threshold_db,
            min_silence.as_secs_f64()
        );
        debug!("Running silence analysis with filter {}", filter);

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(audio)
            .args(["-af", filter.as_str(), "-f", "null", "-"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SplitError::ExternalTool(format!("Failed to run FFmpeg: {e}")))?;

        // silencedetect writes its markers to stderr.
        let report = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let tail: Vec<&str> = report.lines().rev().take(5).collect();
            return Err(SplitError::ExternalTool(format!(
                "FFmpeg silence analysis failed ({}): {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }

        Ok(report)
    }
}

#[async_trait]
impl AudioExtractor for FfmpegTools {
    async fn extract(&self, audio: &Path, start: f64, end: f64, output: &Path) -> Result<()> {
        if end <= start {
            return Err(SplitError::ExternalTool(format!(
                "Refusing to extract empty range {start:.3}..{end:.3}"
            )));
        }

        let start_secs = format_seconds(start);
        let end_secs = format_seconds(end);
        debug!(
            "Stream-copying {} [{}, {}] to {}",
            audio.display(),
            start_secs,
            end_secs,
            output.display()
        );

        let output_result = tokio::process::Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(audio)
            .args(["-ss", start_secs.as_str(), "-to", end_secs.as_str()])
            .args(["-vn", "-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SplitError::ExternalTool(format!("Failed to run FFmpeg: {e}")))?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(SplitError::ExternalTool(format!(
                "FFmpeg segment extraction failed: {}",
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(SplitError::ExternalTool(
                "Extracted segment was not created".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl DurationProbe for FfmpegTools {
    async fn duration(&self, audio: &Path) -> Result<f64> {
        if !audio.exists() {
            return Err(SplitError::FileNotFound(audio.display().to_string()));
        }

        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(audio)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SplitError::ExternalTool(format!("Failed to run FFprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitError::ExternalTool(format!(
                "FFprobe failed: {}",
                stderr.trim()
            )));
        }

        let duration = parse_probe_duration(&String::from_utf8_lossy(&output.stdout))?;
        debug!("{} lasts {:.3}s", audio.display(), duration);
        Ok(duration)
    }
}
