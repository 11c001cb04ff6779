use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::features::FeatureVector;
use crate::labels::{GenreId, LabelTable};
use crate::track::{TrackId, TrackRecord};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded {
        samples: usize,
        sample_rate: u32,
        duration_secs: f64,
    },
    Failed {
        reason: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoadEntry {
    pub id: TrackId,
    pub path: PathBuf,
    pub outcome: LoadOutcome,
}

/// One outcome per requested track, in request order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LoadReport {
    pub entries: Vec<LoadEntry>,
}

impl LoadReport {
    pub fn record(&mut self, record: &TrackRecord, outcome: LoadOutcome) {
        self.entries.push(LoadEntry {
            id: record.id,
            path: record.path.clone(),
            outcome,
        });
    }

    pub fn requested(&self) -> usize {
        self.entries.len()
    }

    pub fn loaded(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, LoadOutcome::Loaded { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &LoadEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, LoadOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackFeatures {
    pub id: TrackId,
    pub path: PathBuf,
    pub features: FeatureVector,
}

/// What a classifier decided for one test track.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    Genre {
        genre: GenreId,
    },
    /// Unsupervised group, with the genre it was aligned to if any.
    Cluster {
        index: usize,
        genre: Option<GenreId>,
    },
}

impl Assignment {
    pub fn genre(&self) -> Option<GenreId> {
        match *self {
            Assignment::Genre { genre } => Some(genre),
            Assignment::Cluster { genre, .. } => genre,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackPrediction {
    pub id: TrackId,
    pub path: PathBuf,
    pub assignment: Assignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassifierResult {
    pub name: String,
    pub heading: String,
    pub predictions: Vec<TrackPrediction>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationReport {
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub labels: LabelTable,
    pub training_load: LoadReport,
    pub test_load: LoadReport,
    pub training_features: Vec<TrackFeatures>,
    pub test_features: Vec<TrackFeatures>,
    pub classifiers: Vec<ClassifierResult>,
}

impl ClassificationReport {
    pub fn new(labels: LabelTable) -> Self {
        Self {
            generated_at: OffsetDateTime::now_utc(),
            labels,
            training_load: LoadReport::default(),
            test_load: LoadReport::default(),
            training_features: Vec::new(),
            test_features: Vec::new(),
            classifiers: Vec::new(),
        }
    }

    /// Display name for an assignment; unaligned clusters render as `cluster <n>`.
    pub fn genre_name(&self, assignment: &Assignment) -> String {
        match assignment.genre().and_then(|genre| self.labels.name(genre)) {
            Some(name) => name.to_string(),
            None => match assignment {
                Assignment::Cluster { index, .. } => format!("cluster {index}"),
                Assignment::Genre { genre } => format!("genre {genre}"),
            },
        }
    }
}
