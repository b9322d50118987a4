use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{Result, SplitError};

use super::AudioBuffer;

/// Interleaved sample storage, keeping the source's integer or float encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl Samples {
    fn len(&self) -> usize {
        match self {
            Samples::Int(s) => s.len(),
            Samples::Float(s) => s.len(),
        }
    }
}

/// Decoded PCM audio held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    spec: WavSpec,
    samples: Samples,
}

impl PcmBuffer {
    pub fn new(spec: WavSpec, samples: Samples) -> Result<Self> {
        let format_matches = matches!(
            (&samples, spec.sample_format),
            (Samples::Int(_), SampleFormat::Int) | (Samples::Float(_), SampleFormat::Float)
        );
        if !format_matches {
            return Err(SplitError::Parse(format!(
                "sample storage does not match {:?} format",
                spec.sample_format
            )));
        }
        if spec.channels == 0 || samples.len() % spec.channels as usize != 0 {
            return Err(SplitError::Parse(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                spec.channels
            )));
        }
        Ok(Self { spec, samples })
    }

    /// Digital silence of `duration`, rounded to whole frames.
    pub fn silence(spec: WavSpec, duration: Duration) -> Self {
        let frames = (duration.as_secs_f64() * spec.sample_rate as f64).round() as usize;
        let len = frames * spec.channels as usize;
        let samples = match spec.sample_format {
            SampleFormat::Int => Samples::Int(vec![0; len]),
            SampleFormat::Float => Samples::Float(vec![0.0; len]),
        };
        Self { spec, samples }
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.spec.sample_rate as f64)
    }

    /// Append `other`, which must share this buffer's spec.
    pub fn append(&mut self, other: &PcmBuffer) -> Result<()> {
        if self.spec != other.spec {
            return Err(SplitError::Parse(format!(
                "cannot concatenate {:?} with {:?}",
                self.spec, other.spec
            )));
        }
        match (&mut self.samples, &other.samples) {
            (Samples::Int(a), Samples::Int(b)) => a.extend_from_slice(b),
            (Samples::Float(a), Samples::Float(b)) => a.extend_from_slice(b),
            _ => unreachable!("spec equality implies matching sample storage"),
        }
        Ok(())
    }

    /// Wrap this buffer with `pad` of silence on both ends.
    pub fn padded(&self, pad: Duration) -> Result<Self> {
        let silence = Self::silence(self.spec, pad);
        let mut out = silence.clone();
        out.append(self)?;
        out.append(&silence)?;
        Ok(out)
    }
}

/// hound-backed buffer capability. Non-PCM input is decoded with ffmpeg first.
#[derive(Debug, Clone)]
pub struct WavBuffer {
    ffmpeg: PathBuf,
}

impl Default for WavBuffer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl WavBuffer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    fn read_wav(path: &Path) -> Result<PcmBuffer> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            SampleFormat::Int => Samples::Int(
                reader
                    .into_samples::<i32>()
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            SampleFormat::Float => Samples::Float(
                reader
                    .into_samples::<f32>()
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
        };
        PcmBuffer::new(spec, samples)
    }

    /// Decode any ffmpeg-readable file into 16-bit PCM WAV next to it.
    fn decode_to_wav(&self, path: &Path) -> Result<PathBuf> {
        let decoded = path.with_extension("decoded.wav");
        debug!("Decoding {} to PCM", path.display());

        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(path)
            .args(["-vn", "-acodec", "pcm_s16le"])
            .arg(&decoded)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SplitError::ExternalTool(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitError::ExternalTool(format!(
                "FFmpeg decode failed: {}",
                stderr.trim()
            )));
        }
        Ok(decoded)
    }
}

impl AudioBuffer for WavBuffer {
    fn load(&self, path: &Path) -> Result<PcmBuffer> {
        if !path.exists() {
            return Err(SplitError::FileNotFound(path.display().to_string()));
        }

        match Self::read_wav(path) {
            Ok(buffer) => Ok(buffer),
            Err(SplitError::Wav(hound::Error::FormatError(_)))
            | Err(SplitError::Wav(hound::Error::Unsupported)) => {
                let decoded = self.decode_to_wav(path)?;
                let buffer = Self::read_wav(&decoded);
                let _ = std::fs::remove_file(&decoded);
                buffer
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, buffer: &PcmBuffer, path: &Path) -> Result<()> {
        let mut writer = WavWriter::create(path, buffer.spec())?;
        match buffer.samples() {
            Samples::Int(samples) => {
                for &s in samples {
                    writer.write_sample(s)?;
                }
            }
            Samples::Float(samples) => {
                for &s in samples {
                    writer.write_sample(s)?;
                }
            }
        }
        writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mono16(rate: u32) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn test_silence_frames() {
        let spec = WavSpec {
            channels: 2,
            ..mono16(16000)
        };
        let silence = PcmBuffer::silence(spec, Duration::from_millis(250));
        assert_eq!(silence.frames(), 4000);
        assert_eq!(silence.samples(), &Samples::Int(vec![0; 8000]));
    }

    #[test]
    fn test_padded_adds_both_ends() {
        let spec = mono16(1000);
        let buffer = PcmBuffer::new(spec, Samples::Int(vec![7; 500])).unwrap();
        let padded = buffer.padded(Duration::from_millis(100)).unwrap();

        assert_eq!(padded.frames(), 700);
        assert_eq!(padded.duration(), Duration::from_millis(700));
        match padded.samples() {
            Samples::Int(s) => {
                assert!(s[..100].iter().all(|&v| v == 0));
                assert!(s[100..600].iter().all(|&v| v == 7));
                assert!(s[600..].iter().all(|&v| v == 0));
            }
            other => panic!("Expected int samples, got {other:?}"),
        }
    }

    #[test]
    fn test_append_rejects_spec_mismatch() {
        let mut a = PcmBuffer::silence(mono16(16000), Duration::from_millis(10));
        let b = PcmBuffer::silence(mono16(44100), Duration::from_millis(10));
        assert!(a.append(&b).is_err());
    }

    #[test]
    fn test_new_rejects_partial_frame() {
        let spec = WavSpec {
            channels: 2,
            ..mono16(8000)
        };
        assert!(PcmBuffer::new(spec, Samples::Int(vec![0; 3])).is_err());
        assert!(PcmBuffer::new(spec, Samples::Float(vec![0.0; 4])).is_err());
    }

    #[test]
    fn test_save_and_load_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i32> = (0..800).map(|i| (i % 64) * 100 - 3200).collect();
        let buffer = PcmBuffer::new(mono16(8000), Samples::Int(samples)).unwrap();

        let io = WavBuffer::default();
        io.save(&buffer, &path).unwrap();
        let loaded = io.load(&path).unwrap();

        assert_eq!(loaded, buffer);
    }

    #[test]
    fn test_load_float_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let buffer = PcmBuffer::new(spec, Samples::Float(vec![0.25, -0.5, 0.75, 0.0])).unwrap();

        let io = WavBuffer::default();
        io.save(&buffer, &path).unwrap();
        assert_eq!(io.load(&path).unwrap(), buffer);
    }

    #[test]
    fn test_load_missing_file() {
        let result = WavBuffer::default().load(Path::new("/nonexistent/chunk.wav"));
        assert!(matches!(result, Err(SplitError::FileNotFound(_))));
    }
}
