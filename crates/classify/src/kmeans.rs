//! Seeded k-means with k-means++ initialization and post-hoc alignment of
//! clusters to genres.

use cadence_domain::{Assignment, FeatureVector, GenreId, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::GenreClassifier;
use crate::error::{ClassifyError, Result};
use crate::training::{ensure_finite, majority, TrainingSet};

type Point = [f64; FEATURE_COUNT];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KMeansParams {
    pub n_clusters: usize,
    /// Independent seedings; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative to the mean per-feature variance of the training data.
    pub tol: f64,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug)]
struct Fitted {
    centers: Vec<Point>,
    /// Genre each cluster was aligned to; `None` for clusters without
    /// members.
    genres: Vec<Option<GenreId>>,
    inertia: f64,
}

#[derive(Clone, Debug)]
pub struct KMeans {
    params: KMeansParams,
    fitted: Option<Fitted>,
}

#[derive(Clone, Debug)]
struct Run {
    centers: Vec<Point>,
    labels: Vec<usize>,
    inertia: f64,
    iterations: usize,
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index and squared distance of the closest center; ties go to the lower
/// index.
fn nearest(point: &Point, centers: &[Point]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, center) in centers.iter().enumerate() {
        let distance = squared_distance(point, center);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}

fn mean_variance(points: &[Point]) -> f64 {
    let n = points.len() as f64;
    let mut total = 0.0;
    for feature in 0..FEATURE_COUNT {
        let mean = points.iter().map(|p| p[feature]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[feature] - mean).powi(2)).sum::<f64>() / n;
    }
    total / FEATURE_COUNT as f64
}

/// First index whose cumulative weight reaches `target`.
fn search_cumulative(cumulative: &[f64], target: f64) -> usize {
    cumulative
        .partition_point(|&value| value < target)
        .min(cumulative.len() - 1)
}

/// Greedy k-means++: each new center is the best of several candidates
/// drawn proportionally to squared distance.
fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let n = points.len();
    let trials = 2 + (k as f64).ln().floor() as usize;

    let mut centers = Vec::with_capacity(k);
    let first = rng.gen_range(0..n);
    centers.push(points[first]);
    let mut closest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();
    let mut potential: f64 = closest.iter().sum();

    while centers.len() < k {
        let mut cumulative = Vec::with_capacity(n);
        let mut running = 0.0;
        for distance in &closest {
            running += distance;
            cumulative.push(running);
        }

        let mut best: Option<(usize, Vec<f64>, f64)> = None;
        for _ in 0..trials {
            let target = rng.gen::<f64>() * potential;
            let candidate = search_cumulative(&cumulative, target);
            let distances: Vec<f64> = points
                .iter()
                .zip(&closest)
                .map(|(p, &current)| current.min(squared_distance(p, &points[candidate])))
                .collect();
            let candidate_potential: f64 = distances.iter().sum();
            if best
                .as_ref()
                .map_or(true, |(_, _, top)| candidate_potential < *top)
            {
                best = Some((candidate, distances, candidate_potential));
            }
        }

        if let Some((candidate, distances, candidate_potential)) = best {
            centers.push(points[candidate]);
            closest = distances;
            potential = candidate_potential;
        }
    }
    centers
}

fn assign(points: &[Point], centers: &[Point]) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = points
        .iter()
        .map(|p| {
            let (label, distance) = nearest(p, centers);
            inertia += distance;
            label
        })
        .collect();
    (labels, inertia)
}

/// Means of each cluster's members. A cluster that lost all its members is
/// moved onto the point farthest from its current center.
fn update_centers(points: &[Point], labels: &[usize], centers: &[Point]) -> Vec<Point> {
    let k = centers.len();
    let mut sums = vec![[0.0; FEATURE_COUNT]; k];
    let mut counts = vec![0usize; k];
    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    let mut far: Vec<usize> = (0..points.len()).collect();
    far.sort_by(|&a, &b| {
        let da = squared_distance(&points[a], &centers[labels[a]]);
        let db = squared_distance(&points[b], &centers[labels[b]]);
        db.total_cmp(&da)
    });
    let mut far = far.into_iter();

    let mut updated = Vec::with_capacity(k);
    for cluster in 0..k {
        if counts[cluster] > 0 {
            let mut center = sums[cluster];
            center.iter_mut().for_each(|v| *v /= counts[cluster] as f64);
            updated.push(center);
        } else if let Some(index) = far.next() {
            updated.push(points[index]);
        } else {
            updated.push(centers[cluster]);
        }
    }
    updated
}

fn lloyd(points: &[Point], mut centers: Vec<Point>, max_iter: usize, tol: f64) -> Run {
    let mut labels: Vec<usize> = Vec::new();
    let mut iterations = 0;
    for _ in 0..max_iter {
        iterations += 1;
        let (new_labels, _) = assign(points, &centers);
        let new_centers = update_centers(points, &new_labels, &centers);
        let shift: f64 = centers
            .iter()
            .zip(&new_centers)
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        let stable = new_labels == labels;
        labels = new_labels;
        centers = new_centers;
        if stable || shift <= tol {
            break;
        }
    }
    let (labels, inertia) = assign(points, &centers);
    Run {
        centers,
        labels,
        inertia,
        iterations,
    }
}

impl KMeans {
    pub fn new(params: KMeansParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &KMeansParams {
        &self.params
    }

    /// Cluster centers in feature order, once fitted.
    pub fn centers(&self) -> Option<Vec<FeatureVector>> {
        self.fitted
            .as_ref()
            .map(|f| f.centers.iter().map(|c| FeatureVector::from(*c)).collect())
    }

    /// Genre each cluster was aligned to, once fitted.
    pub fn cluster_genres(&self) -> Option<&[Option<GenreId>]> {
        self.fitted.as_ref().map(|f| f.genres.as_slice())
    }

    pub fn inertia(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.inertia)
    }
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(KMeansParams::default())
    }
}

impl GenreClassifier for KMeans {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn heading(&self) -> &'static str {
        "KMEANS CLUSTERING"
    }

    fn fit(&mut self, training: &TrainingSet) -> Result<()> {
        let k = self.params.n_clusters;
        if k == 0 || self.params.n_init == 0 || self.params.max_iter == 0 {
            return Err(ClassifyError::InvalidParameter(
                "k-means needs positive n_clusters, n_init and max_iter".into(),
            ));
        }
        if training.is_empty() {
            return Err(ClassifyError::EmptyTrainingSet);
        }
        ensure_finite(training.samples(), "training")?;
        if training.len() < k {
            return Err(ClassifyError::TooFewSamples {
                model: "kmeans",
                required: k,
                available: training.len(),
            });
        }

        let points: Vec<Point> = training.samples().iter().map(|s| s.to_array()).collect();
        let tol = self.params.tol * mean_variance(&points);
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let mut best: Option<Run> = None;
        for _ in 0..self.params.n_init {
            let seeds = kmeans_plus_plus(&points, k, &mut rng);
            let run = lloyd(&points, seeds, self.params.max_iter, tol);
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let run = best.ok_or(ClassifyError::EmptyTrainingSet)?;

        let genres: Vec<Option<GenreId>> = (0..k)
            .map(|cluster| {
                majority(
                    run.labels
                        .iter()
                        .zip(training.labels())
                        .filter(|(&label, _)| label == cluster)
                        .map(|(_, &genre)| genre),
                )
            })
            .collect();
        debug!(
            inertia = run.inertia,
            iterations = run.iterations,
            ?genres,
            "k-means fitted"
        );

        self.fitted = Some(Fitted {
            centers: run.centers,
            genres,
            inertia: run.inertia,
        });
        Ok(())
    }

    fn predict(&self, samples: &[FeatureVector]) -> Result<Vec<Assignment>> {
        let fitted = self.fitted.as_ref().ok_or(ClassifyError::NotFitted("kmeans"))?;
        ensure_finite(samples, "test")?;
        Ok(samples
            .iter()
            .map(|sample| {
                let (index, _) = nearest(&sample.to_array(), &fitted.centers);
                Assignment::Cluster {
                    index,
                    genre: fitted.genres[index],
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(center: f64, count: usize, label: usize) -> Vec<(FeatureVector, GenreId)> {
        (0..count)
            .map(|i| {
                let jitter = i as f64 * 0.01;
                let values = [
                    center + jitter,
                    center * 10.0,
                    center,
                    center,
                    center,
                    -jitter,
                ];
                (FeatureVector::from(values), GenreId(label))
            })
            .collect()
    }

    fn two_blobs() -> TrainingSet {
        blob(0.0, 4, 0).into_iter().chain(blob(5.0, 4, 1)).collect()
    }

    #[test]
    fn separates_well_spaced_blobs_and_aligns_genres() {
        let mut model = KMeans::default();
        model.fit(&two_blobs()).unwrap();
        assert_eq!(model.centers().unwrap().len(), 2);

        let predictions = model
            .predict(&[
                FeatureVector::from([0.1, 0.0, 0.0, 0.0, 0.0, 0.0]),
                FeatureVector::from([5.1, 50.0, 5.0, 5.0, 5.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(predictions[0].genre(), Some(GenreId(0)));
        assert_eq!(predictions[1].genre(), Some(GenreId(1)));
        assert!(matches!(predictions[0], Assignment::Cluster { .. }));
    }

    #[test]
    fn fixed_seed_is_repeatable() {
        let training = two_blobs();
        let mut first = KMeans::default();
        let mut second = KMeans::default();
        first.fit(&training).unwrap();
        second.fit(&training).unwrap();
        assert_eq!(first.centers(), second.centers());
        assert_eq!(first.cluster_genres(), second.cluster_genres());
    }

    #[test]
    fn every_test_vector_gets_one_of_two_clusters() {
        let training: TrainingSet = vec![
            (FeatureVector::from([1.0; 6]), GenreId(0)),
            (FeatureVector::from([2.0; 6]), GenreId(1)),
        ]
        .into_iter()
        .collect();
        let mut model = KMeans::default();
        model.fit(&training).unwrap();
        let tests: Vec<_> = (0..5).map(|i| FeatureVector::from([i as f64; 6])).collect();
        for assignment in model.predict(&tests).unwrap() {
            match assignment {
                Assignment::Cluster { index, .. } => assert!(index < 2),
                other => panic!("unexpected assignment {other:?}"),
            }
        }
    }

    #[test]
    fn needs_at_least_k_samples() {
        let training: TrainingSet = blob(0.0, 1, 0).into_iter().collect();
        let err = KMeans::default().fit(&training).unwrap_err();
        assert!(matches!(err, ClassifyError::TooFewSamples { required: 2, available: 1, .. }));
    }

    #[test]
    fn predicting_before_fit_fails() {
        let err = KMeans::default().predict(&[FeatureVector::default()]).unwrap_err();
        assert!(matches!(err, ClassifyError::NotFitted("kmeans")));
    }

    #[test]
    fn identical_points_still_yield_two_clusters() {
        let training: TrainingSet = (0..4)
            .map(|i| (FeatureVector::from([3.0; 6]), GenreId(i % 2)))
            .collect();
        let mut model = KMeans::default();
        model.fit(&training).unwrap();
        assert_eq!(model.centers().unwrap().len(), 2);
        assert_eq!(model.inertia(), Some(0.0));
    }
}
