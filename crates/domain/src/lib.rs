pub mod error;
pub mod features;
pub mod io;
pub mod labels;
pub mod manifest;
pub mod report;
pub mod track;

pub use crate::error::DomainError;
pub use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use crate::io::{JsonExporter, ReportExporter, ReportFormat, TextExporter};
pub use crate::labels::{GenreId, LabelTable};
pub use crate::manifest::DatasetManifest;
pub use crate::report::{
    Assignment, ClassificationReport, ClassifierResult, LoadEntry, LoadOutcome, LoadReport,
    TrackFeatures, TrackPrediction,
};
pub use crate::track::{number_records, TrackId, TrackRecord};
