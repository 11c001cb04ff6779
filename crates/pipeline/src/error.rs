use std::path::PathBuf;

use cadence_audio::AudioError;
use cadence_classify::ClassifyError;
use cadence_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path:?}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },
    #[error("{} track(s) failed to load: {}", .0.len(), .0.join(", "))]
    LoadAborted(Vec<String>),
    #[error("features of training track {0} have no matching record")]
    UnknownTrack(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
