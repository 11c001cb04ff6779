pub mod classifier;
pub mod error;
pub mod kmeans;
pub mod knn;
pub mod training;
pub mod tree;

pub use classifier::{ClassifierConfig, ClassifierKind, GenreClassifier};
pub use error::ClassifyError;
pub use kmeans::{KMeans, KMeansParams};
pub use knn::{KnnParams, NearestNeighbors};
pub use training::{ensure_finite, majority, TrainingSet};
pub use tree::{DecisionTree, TreeParams};
