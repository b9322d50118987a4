use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Failed to parse tool output: {0}")]
    Parse(String),

    #[error("Export of chunk {index} failed: {message}")]
    Export { index: usize, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SplitError {
    /// Attach a chunk index to an error raised while exporting that chunk.
    pub fn for_chunk(self, index: usize) -> Self {
        match self {
            SplitError::Export { .. } => self,
            other => SplitError::Export {
                index,
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_chunk_wraps_other_errors() {
        let err = SplitError::ExternalTool("ffmpeg exited with 1".to_string()).for_chunk(3);
        match err {
            SplitError::Export { index, message } => {
                assert_eq!(index, 3);
                assert!(message.contains("ffmpeg exited with 1"));
            }
            other => panic!("Expected Export error, got: {other}"),
        }
    }

    #[test]
    fn test_for_chunk_keeps_existing_index() {
        let err = SplitError::Export {
            index: 1,
            message: "disk full".to_string(),
        }
        .for_chunk(7);
        assert!(matches!(err, SplitError::Export { index: 1, .. }));
    }
}
