use cadence_domain::{Assignment, FeatureVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::GenreClassifier;
use crate::error::{ClassifyError, Result};
use crate::training::{ensure_finite, majority, TrainingSet};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnnParams {
    pub k: usize,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { k: 5 }
    }
}

/// Uniform-vote k-nearest-neighbor classifier over Euclidean distance.
#[derive(Clone, Debug)]
pub struct NearestNeighbors {
    params: KnnParams,
    training: Option<TrainingSet>,
}

impl NearestNeighbors {
    pub fn new(params: KnnParams) -> Self {
        Self {
            params,
            training: None,
        }
    }

    /// Indices of the `k` closest training samples, nearest first. Equal
    /// distances keep training order.
    fn neighbors(&self, training: &TrainingSet, sample: &FeatureVector) -> Vec<usize> {
        let mut ranked: Vec<(usize, f64)> = training
            .samples()
            .iter()
            .enumerate()
            .map(|(index, candidate)| (index, candidate.squared_distance(sample)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked
            .into_iter()
            .take(self.params.k)
            .map(|(index, _)| index)
            .collect()
    }
}

impl Default for NearestNeighbors {
    fn default() -> Self {
        Self::new(KnnParams::default())
    }
}

impl GenreClassifier for NearestNeighbors {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn heading(&self) -> &'static str {
        "KNN CLASSIFIER"
    }

    fn fit(&mut self, training: &TrainingSet) -> Result<()> {
        if self.params.k == 0 {
            return Err(ClassifyError::InvalidParameter(
                "knn needs k of at least 1".into(),
            ));
        }
        if training.is_empty() {
            return Err(ClassifyError::EmptyTrainingSet);
        }
        ensure_finite(training.samples(), "training")?;
        if training.len() < self.params.k {
            return Err(ClassifyError::TooFewSamples {
                model: "knn",
                required: self.params.k,
                available: training.len(),
            });
        }
        debug!(k = self.params.k, samples = training.len(), "knn fitted");
        self.training = Some(training.clone());
        Ok(())
    }

    fn predict(&self, samples: &[FeatureVector]) -> Result<Vec<Assignment>> {
        let training = self.training.as_ref().ok_or(ClassifyError::NotFitted("knn"))?;
        ensure_finite(samples, "test")?;
        samples
            .iter()
            .map(|sample| {
                let votes = self
                    .neighbors(training, sample)
                    .into_iter()
                    .map(|index| training.labels()[index]);
                majority(votes)
                    .map(|genre| Assignment::Genre { genre })
                    .ok_or(ClassifyError::EmptyTrainingSet)
            })
            .collect()
    }
}
