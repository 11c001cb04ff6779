use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("open audio file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unreadable audio stream: {0}")]
    Format(#[from] symphonia::core::errors::Error),
    #[error("no default track found")]
    NoTrack,
    #[error("audio stream contains no samples")]
    EmptyAudio,
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("signal is empty")]
    EmptySignal,
    #[error("sample {index} is not finite")]
    NonFiniteSample { index: usize },
    #[error("extracted features are not finite: {0}")]
    NonFiniteFeatures(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("fft failed: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;
