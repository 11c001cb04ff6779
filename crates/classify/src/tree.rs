//! CART decision tree with Gini impurity.

use cadence_domain::{Assignment, FeatureVector, GenreId, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::GenreClassifier;
use crate::error::{ClassifyError, Result};
use crate::training::{ensure_finite, majority, TrainingSet};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreeParams {
    /// Unlimited when absent.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Leaf {
        genre: GenreId,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.leaves() + right.leaves(),
        }
    }

    fn classify(&self, sample: &[f64; FEATURE_COUNT]) -> GenreId {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { genre } => return *genre,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&count| (count as f64 / total).powi(2))
        .sum::<f64>()
}

/// Threshold between two sorted distinct values, kept strictly below the
/// upper one.
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high {
        low
    } else {
        mid
    }
}

struct Builder<'a> {
    points: Vec<[f64; FEATURE_COUNT]>,
    labels: &'a [GenreId],
    classes: usize,
    params: &'a TreeParams,
}

impl Builder<'_> {
    fn counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.classes];
        for &i in indices {
            counts[self.labels[i].index()] += 1;
        }
        counts
    }

    /// Lowest weighted child impurity over all features and thresholds.
    /// Ties keep the earlier feature and the lower threshold.
    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let total = indices.len();
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();
        for feature in 0..FEATURE_COUNT {
            sorted.sort_by(|&a, &b| self.points[a][feature].total_cmp(&self.points[b][feature]));
            let mut left = vec![0usize; self.classes];
            let mut right = self.counts(indices);
            for position in 0..total - 1 {
                let label = self.labels[sorted[position]].index();
                left[label] += 1;
                right[label] -= 1;

                let low = self.points[sorted[position]][feature];
                let high = self.points[sorted[position + 1]][feature];
                if low == high {
                    continue;
                }
                let n_left = position + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / total as f64;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(low, high),
                        impurity,
                    });
                }
            }
        }
        best
    }

    fn build(&self, indices: &[usize], depth: usize) -> Node {
        let counts = self.counts(indices);
        let impurity = gini(&counts, indices.len());
        let leaf = || Node::Leaf {
            genre: majority(indices.iter().map(|&i| self.labels[i])).unwrap_or(GenreId(0)),
        };

        let depth_reached = self.params.max_depth.map_or(false, |max| depth >= max);
        if impurity <= 0.0 || indices.len() < self.params.min_samples_split.max(2) || depth_reached
        {
            return leaf();
        }
        let Some(split) = self.best_split(indices) else {
            return leaf();
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.points[i][split.feature] <= split.threshold);
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecisionTree {
    params: TreeParams,
    root: Option<Node>,
}

impl DecisionTree {
    pub fn new(params: TreeParams) -> Self {
        Self { params, root: None }
    }

    /// Longest root-to-leaf path, once fitted.
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(Node::depth)
    }

    pub fn leaf_count(&self) -> Option<usize> {
        self.root.as_ref().map(Node::leaves)
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl GenreClassifier for DecisionTree {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn heading(&self) -> &'static str {
        "DECISION TREE CLASSIFIER"
    }

    fn fit(&mut self, training: &TrainingSet) -> Result<()> {
        if training.is_empty() {
            return Err(ClassifyError::EmptyTrainingSet);
        }
        ensure_finite(training.samples(), "training")?;
        let classes = training
            .labels()
            .iter()
            .map(|label| label.index() + 1)
            .max()
            .unwrap_or(0);
        let builder = Builder {
            points: training.samples().iter().map(|s| s.to_array()).collect(),
            labels: training.labels(),
            classes,
            params: &self.params,
        };
        let indices: Vec<usize> = (0..training.len()).collect();
        let root = builder.build(&indices, 0);
        debug!(depth = root.depth(), leaves = root.leaves(), "decision tree fitted");
        self.root = Some(root);
        Ok(())
    }

    fn predict(&self, samples: &[FeatureVector]) -> Result<Vec<Assignment>> {
        let root = self.root.as_ref().ok_or(ClassifyError::NotFitted("tree"))?;
        ensure_finite(samples, "test")?;
        Ok(samples
            .iter()
            .map(|sample| Assignment::Genre {
                genre: root.classify(&sample.to_array()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample(tempo: f64, mel: f64) -> FeatureVector {
        FeatureVector {
            tempo,
            mel,
            ..FeatureVector::default()
        }
    }

    #[test]
    fn gini_of_pure_and_mixed_nodes() {
        assert_abs_diff_eq!(gini(&[4, 0], 4), 0.0);
        assert_abs_diff_eq!(gini(&[2, 2], 4), 0.5);
    }

    #[test]
    fn learns_single_threshold() {
        let training: TrainingSet = [(90.0, 0), (95.0, 0), (128.0, 1), (135.0, 1)]
            .into_iter()
            .map(|(tempo, label)| (sample(tempo, 1.0), GenreId(label)))
            .collect();
        let mut tree = DecisionTree::default();
        tree.fit(&training).unwrap();
        assert_eq!(tree.depth(), Some(1));

        let predictions = tree.predict(&[sample(100.0, 0.0), sample(140.0, 0.0)]).unwrap();
        assert_eq!(predictions[0].genre(), Some(GenreId(0)));
        assert_eq!(predictions[1].genre(), Some(GenreId(1)));
    }

    #[test]
    fn fits_training_data_exactly_without_depth_limit() {
        // XOR-like layout needs two levels.
        let points = [(0.0, 0.0, 0), (0.0, 1.0, 1), (1.0, 0.0, 1), (1.0, 1.0, 0)];
        let training: TrainingSet = points
            .iter()
            .map(|&(t, m, label)| (sample(t, m), GenreId(label)))
            .collect();
        let mut tree = DecisionTree::default();
        tree.fit(&training).unwrap();
        let predicted = tree.predict(training.samples()).unwrap();
        for (assignment, expected) in predicted.iter().zip(training.labels()) {
            assert_eq!(assignment.genre(), Some(*expected));
        }
    }

    #[test]
    fn depth_limit_produces_majority_leaf() {
        let training: TrainingSet = [(1.0, 0), (2.0, 1), (3.0, 1)]
            .into_iter()
            .map(|(tempo, label)| (sample(tempo, 0.0), GenreId(label)))
            .collect();
        let mut tree = DecisionTree::new(TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        });
        tree.fit(&training).unwrap();
        assert_eq!(tree.leaf_count(), Some(1));
        let predicted = tree.predict(&[sample(1.0, 0.0)]).unwrap();
        assert_eq!(predicted[0].genre(), Some(GenreId(1)));
    }

    #[test]
    fn identical_samples_with_different_labels_stay_a_leaf() {
        let training: TrainingSet = (0..4)
            .map(|i| (sample(120.0, 1.0), GenreId(i % 2)))
            .collect();
        let mut tree = DecisionTree::default();
        tree.fit(&training).unwrap();
        assert_eq!(tree.depth(), Some(0));
        let predicted = tree.predict(&[sample(0.0, 0.0)]).unwrap();
        assert_eq!(predicted[0].genre(), Some(GenreId(0)));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let err = DecisionTree::default().fit(&TrainingSet::new()).unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyTrainingSet));
    }
}
