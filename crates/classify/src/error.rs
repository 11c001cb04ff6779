use cadence_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("{model} needs at least {required} training samples, got {available}")]
    TooFewSamples {
        model: &'static str,
        required: usize,
        available: usize,
    },
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),
    #[error("{stage} vector {index} has a non-finite feature")]
    NonFinite { stage: &'static str, index: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
