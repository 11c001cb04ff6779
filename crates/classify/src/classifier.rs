use std::fmt;
use std::str::FromStr;

use cadence_domain::{Assignment, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kmeans::{KMeans, KMeansParams};
use crate::knn::{KnnParams, NearestNeighbors};
use crate::training::TrainingSet;
use crate::tree::{DecisionTree, TreeParams};

/// A model that learns from labeled feature vectors and assigns test
/// vectors to genres or clusters.
pub trait GenreClassifier {
    fn name(&self) -> &'static str;

    /// Report heading for this model's predictions.
    fn heading(&self) -> &'static str;

    fn fit(&mut self, training: &TrainingSet) -> Result<()>;

    fn predict(&self, samples: &[FeatureVector]) -> Result<Vec<Assignment>>;
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    KMeans,
    Tree,
    Knn,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [Self::KMeans, Self::Tree, Self::Knn];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::KMeans => "kmeans",
            Self::Tree => "tree",
            Self::Knn => "knn",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown classifier {value:?}, expected kmeans, tree or knn"))
    }
}

/// Which models run, in order, and their parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: Vec<ClassifierKind>,
    pub kmeans: KMeansParams,
    pub tree: TreeParams,
    pub knn: KnnParams,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: ClassifierKind::ALL.to_vec(),
            kmeans: KMeansParams::default(),
            tree: TreeParams::default(),
            knn: KnnParams::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn build(&self) -> Vec<Box<dyn GenreClassifier>> {
        self.enabled
            .iter()
            .map(|kind| -> Box<dyn GenreClassifier> {
                match kind {
                    ClassifierKind::KMeans => Box::new(KMeans::new(self.kmeans.clone())),
                    ClassifierKind::Tree => Box::new(DecisionTree::new(self.tree.clone())),
                    ClassifierKind::Knn => Box::new(NearestNeighbors::new(self.knn.clone())),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("KNN".parse::<ClassifierKind>().unwrap(), ClassifierKind::Knn);
        assert_eq!("kmeans".parse::<ClassifierKind>().unwrap(), ClassifierKind::KMeans);
        assert!("svm".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn default_config_builds_all_models_in_order() {
        let names: Vec<_> = ClassifierConfig::default()
            .build()
            .iter()
            .map(|model| model.name())
            .collect();
        assert_eq!(names, vec!["kmeans", "tree", "knn"]);
    }
}
