pub mod audio;
pub mod config;
pub mod error;
pub mod interactive;
pub mod pipeline;

pub use config::{Config, SplitConfig};
pub use error::{Result, SplitError};
pub use pipeline::{
    print_summary, split_audio, ChunkOutcome, ChunkStatus, SplitPipeline, SplitReport, SplitStats,
};
