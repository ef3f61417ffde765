pub mod convert;

pub use convert::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio conversion failed: {0}")]
    ConversionFailed(String),
    #[error("FFmpeg not found or not executable")]
    FfmpegNotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
