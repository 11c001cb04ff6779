use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("feature/label length mismatch: {features} feature vectors for {labels} labels")]
    LengthMismatch { features: usize, labels: usize },
    #[error("unknown genre label {0:?}")]
    UnknownLabel(String),
}

impl DomainError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }
}
