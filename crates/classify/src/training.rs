use std::collections::BTreeMap;

use cadence_domain::{DomainError, FeatureVector, GenreId};

use crate::error::{ClassifyError, Result};

/// Feature vectors paired with their genre labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSet {
    samples: Vec<FeatureVector>,
    labels: Vec<GenreId>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zips two sequences that must line up one-to-one.
    pub fn from_parallel(
        samples: Vec<FeatureVector>,
        labels: Vec<GenreId>,
    ) -> std::result::Result<Self, DomainError> {
        if samples.len() != labels.len() {
            return Err(DomainError::LengthMismatch {
                features: samples.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { samples, labels })
    }

    pub fn push(&mut self, sample: FeatureVector, label: GenreId) {
        self.samples.push(sample);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FeatureVector] {
        &self.samples
    }

    pub fn labels(&self) -> &[GenreId] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureVector, GenreId)> {
        self.samples.iter().zip(self.labels.iter().copied())
    }
}

impl FromIterator<(FeatureVector, GenreId)> for TrainingSet {
    fn from_iter<I: IntoIterator<Item = (FeatureVector, GenreId)>>(iter: I) -> Self {
        let mut set = TrainingSet::new();
        for (sample, label) in iter {
            set.push(sample, label);
        }
        set
    }
}

/// Fails on the first vector holding a NaN or infinite feature.
pub fn ensure_finite(samples: &[FeatureVector], stage: &'static str) -> Result<()> {
    match samples.iter().position(|sample| !sample.is_finite()) {
        Some(index) => Err(ClassifyError::NonFinite { stage, index }),
        None => Ok(()),
    }
}

/// Most frequent label; ties go to the lower label.
pub fn majority<I>(labels: I) -> Option<GenreId>
where
    I: IntoIterator<Item = GenreId>,
{
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    let mut best: Option<(GenreId, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}
