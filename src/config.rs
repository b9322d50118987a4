use crate::error::{Result, SplitError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Minimum gap ffmpeg's silencedetect must see before it reports a silence.
pub const SILENCE_GAP: Duration = Duration::from_millis(200);

/// Persisted defaults, loaded from the config file and the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_length: f64,
    pub max_length: f64,
    pub silence_thresh: f64,
    pub pad_ms: u64,
    pub max_workers: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_length: 10.0,
            max_length: 15.0,
            silence_thresh: -30.0,
            pad_ms: 200,
            max_workers: 4,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!("Ignoring malformed {}: {}", config_path.display(), e),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `SILENCE_SPLIT_*` variables; unparseable values are ignored.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SILENCE_SPLIT_MIN_LENGTH").and_then(|v| v.parse().ok()) {
            self.min_length = v;
        }
        if let Some(v) = lookup("SILENCE_SPLIT_MAX_LENGTH").and_then(|v| v.parse().ok()) {
            self.max_length = v;
        }
        if let Some(v) = lookup("SILENCE_SPLIT_SILENCE_THRESH").and_then(|v| v.parse().ok()) {
            self.silence_thresh = v;
        }
        if let Some(v) = lookup("SILENCE_SPLIT_PAD_MS").and_then(|v| v.parse().ok()) {
            self.pad_ms = v;
        }
        if let Some(v) = lookup("SILENCE_SPLIT_MAX_WORKERS").and_then(|v| v.parse().ok()) {
            self.max_workers = v;
        }
        if let Some(v) = lookup("SILENCE_SPLIT_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SILENCE_SPLIT_FFPROBE") {
            self.ffprobe_path = PathBuf::from(v);
        }
    }

    /// Build the per-run parameter bundle from these defaults.
    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            min_length: self.min_length,
            max_length: self.max_length,
            silence_threshold_db: self.silence_thresh,
            silence_gap: SILENCE_GAP,
            pad: Duration::from_millis(self.pad_ms),
            workers: self.max_workers,
            fail_fast: false,
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("silence-split").join("config.toml"))
    }
}

/// Immutable parameters for one split run.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Segments shorter than this (seconds) are absorbed into the next boundary.
    pub min_length: f64,
    /// Segments longer than this (seconds) are force-cut.
    pub max_length: f64,
    /// Noise floor below which audio counts as silence, in dB.
    pub silence_threshold_db: f64,
    pub silence_gap: Duration,
    /// Silence added to the head and tail of every chunk.
    pub pad: Duration,
    pub workers: usize,
    /// Skip chunks that have not started once any chunk fails.
    pub fail_fast: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Config::default().split_config()
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_length.is_finite() || self.min_length < 0.0 {
            return Err(SplitError::Config(format!(
                "min_length must be a non-negative number of seconds, got {}",
                self.min_length
            )));
        }
        if !self.max_length.is_finite() || self.max_length <= 0.0 {
            return Err(SplitError::Config(format!(
                "max_length must be greater than 0, got {}",
                self.max_length
            )));
        }
        if !self.silence_threshold_db.is_finite() {
            return Err(SplitError::Config(
                "silence threshold must be a finite dB value".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(SplitError::Config(
                "max_workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
