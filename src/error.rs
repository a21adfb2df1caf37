use std::path::PathBuf;
use thiserror::Error;

/// Every failure the engine reports to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The file or resource backing a source does not exist.
    #[error("audio source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The source exists but cannot be probed or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// FFT size is zero, not a power of two, or larger than the sample window.
    #[error("invalid FFT window size {0}: must be a non-zero power of two that fits the sample window")]
    InvalidWindowSize(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no audio source loaded")]
    NotLoaded,

    #[error("failed to start {0} thread: {1}")]
    Thread(&'static str, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<symphonia::core::errors::Error> for EngineError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}
