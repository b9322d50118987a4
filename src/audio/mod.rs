pub mod buffer;
pub mod chunk;
pub mod ffmpeg;
pub mod silence;

pub use buffer::{PcmBuffer, Samples, WavBuffer};
pub use chunk::{chunk_file_name, plan_chunks, ChunkExporter};
pub use ffmpeg::{check_ffmpeg, check_ffprobe, FfmpegTools};
pub use silence::{detect_silence, marker_times, parse_silence_markers};

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Whether a marker opens or closes a silent region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

/// A silence boundary reported by the analyzer, in seconds from file start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceMarker {
    pub kind: MarkerKind,
    pub time: f64,
}

/// A contiguous range of the source selected for one output file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkInterval {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl ChunkInterval {
    /// Length of this interval in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.length().max(0.0))
    }
}

/// Runs silence analysis over a whole file and returns its diagnostic text.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn silence_report(
        &self,
        audio: &Path,
        threshold_db: f64,
        min_silence: Duration,
    ) -> Result<String>;
}

/// Copies `[start, end]` seconds of the source into `output` without re-encoding.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, audio: &Path, start: f64, end: f64, output: &Path) -> Result<()>;
}

/// Reports the total duration of a media file in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, audio: &Path) -> Result<f64>;
}

/// Loads audio into memory and writes it back out as uncompressed WAV.
///
/// Both calls block; the exporter runs them on the blocking pool.
pub trait AudioBuffer: Send + Sync {
    fn load(&self, path: &Path) -> Result<PcmBuffer>;
    fn save(&self, buffer: &PcmBuffer, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_length() {
        let interval = ChunkInterval {
            index: 0,
            start: 2.5,
            end: 10.0,
        };
        assert_eq!(interval.length(), 7.5);
        assert_eq!(interval.duration(), Duration::from_millis(7500));
    }
}
