pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{LoadFailurePolicy, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{classify_features, GenrePipeline};
