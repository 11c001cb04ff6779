use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Position of a record within its manifest list.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct TrackId(pub usize);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An audio file paired with its genre name.
///
/// Training records always carry a genre; test records may leave it out
/// when the ground truth is unknown.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackRecord {
    #[serde(skip)]
    pub id: TrackId,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl TrackRecord {
    pub fn labeled(path: impl Into<PathBuf>, genre: impl Into<String>) -> Self {
        Self {
            id: TrackId::default(),
            path: path.into(),
            genre: Some(genre.into()),
        }
    }

    pub fn unlabeled(path: impl Into<PathBuf>) -> Self {
        Self {
            id: TrackId::default(),
            path: path.into(),
            genre: None,
        }
    }

    pub fn with_id(mut self, id: TrackId) -> Self {
        self.id = id;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Assigns ids in list order.
pub fn number_records(records: &mut [TrackRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = TrackId(index);
    }
}
