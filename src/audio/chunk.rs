use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SplitError};

use super::{AudioBuffer, AudioExtractor, ChunkInterval};

/// Plan chunk boundaries from silence times with a single greedy forward scan.
///
/// Candidates closer than `min_length` to the cursor are skipped. A candidate
/// further than `max_length` away yields a chunk clipped to `max_length` and
/// is then dropped. Whatever remains after the last candidate becomes one
/// trailing chunk, however long or short it is. The result tiles
/// `[0, file_duration]` with no gaps, overlaps or empty intervals.
pub fn plan_chunks(
    timestamps: &[f64],
    min_length: f64,
    max_length: f64,
    file_duration: f64,
) -> Vec<ChunkInterval> {
    let mut chunks = Vec::new();
    let mut cursor = 0.0_f64;

    for &t in timestamps {
        if cursor >= file_duration {
            break;
        }

        let segment_length = t - cursor;
        if segment_length <= 0.0 || segment_length < min_length {
            continue;
        }

        let end = if segment_length > max_length {
            cursor + max_length
        } else {
            t
        }
        .min(file_duration);

        if end <= cursor {
            continue;
        }

        chunks.push(ChunkInterval {
            index: chunks.len(),
            start: cursor,
            end,
        });
        cursor = end;
    }

    if cursor < file_duration {
        chunks.push(ChunkInterval {
            index: chunks.len(),
            start: cursor,
            end: file_duration,
        });
    }

    chunks
}

/// Restrict an interval to `[0, file_duration]`.
fn clamp_interval(interval: &ChunkInterval, file_duration: f64) -> ChunkInterval {
    ChunkInterval {
        index: interval.index,
        start: interval.start.max(0.0),
        end: interval.end.min(file_duration),
    }
}

/// Output file name for the chunk at `index`.
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{}.wav", index)
}

/// Cuts one interval out of the source and writes it with silence padding.
#[derive(Clone)]
pub struct ChunkExporter {
    extractor: Arc<dyn AudioExtractor>,
    buffer: Arc<dyn AudioBuffer>,
    pad: Duration,
}

impl ChunkExporter {
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        buffer: Arc<dyn AudioBuffer>,
        pad: Duration,
    ) -> Self {
        Self {
            extractor,
            buffer,
            pad,
        }
    }

    /// Export `interval` of `source` to `output`, overwriting any existing file.
    ///
    /// The stream-copied intermediate lives in a scratch directory beside
    /// `output` that is removed on every return path.
    pub async fn export(
        &self,
        source: &Path,
        interval: &ChunkInterval,
        file_duration: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        let clamped = clamp_interval(interval, file_duration);
        let ChunkInterval { index, start, end } = clamped;

        let scratch_parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix(&format!(".chunk_{}_", index))
            .tempdir_in(scratch_parent)
            .map_err(|e| SplitError::from(e).for_chunk(index))?;

        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav");
        let segment_path = scratch.path().join(format!("segment.{}", extension));

        debug!(
            "Chunk {}: extracting {:.3}s..{:.3}s ({:?}) into {}",
            index,
            start,
            end,
            clamped.duration(),
            segment_path.display()
        );

        self.extractor
            .extract(source, start, end, &segment_path)
            .await
            .map_err(|e| e.for_chunk(index))?;

        let buffer = Arc::clone(&self.buffer);
        let pad = self.pad;
        let output_path = output.to_path_buf();
        let written = output_path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let segment = buffer.load(&segment_path)?;
            let padded = segment.padded(pad)?;
            buffer.save(&padded, &output_path)
        })
        .await
        .map_err(|e| SplitError::Export {
            index,
            message: format!("export task panicked: {e}"),
        })?
        .map_err(|e| e.for_chunk(index))?;

        drop(scratch);
        debug!("Chunk {} written to {}", index, written.display());
        Ok(written)
    }
}
