use std::path::PathBuf;
use thiserror::Error;

/// Per-image extraction failure. The extractor never surfaces these to
/// callers of `extract`; they are logged and replaced by a zero embedding.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("backbone error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("backbone weights not found at {0}")]
    WeightsNotFound(PathBuf),

    #[error("backbone unavailable: {0}")]
    Unavailable(String),

    #[error("backbone panicked during inference")]
    Panicked,

    #[error("embedding has {actual} values, expected {expected}")]
    Dimension { expected: usize, actual: usize },
}
