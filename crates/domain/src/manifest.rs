use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::labels::{GenreId, LabelTable};
use crate::track::{number_records, TrackRecord};
use crate::DomainError;

/// Labeled training records, test records and the genre names they use.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DatasetManifest {
    #[serde(default)]
    pub labels: LabelTable,
    pub training: Vec<TrackRecord>,
    #[serde(default)]
    pub test: Vec<TrackRecord>,
}

impl DatasetManifest {
    pub fn new(
        labels: LabelTable,
        training: Vec<TrackRecord>,
        test: Vec<TrackRecord>,
    ) -> Result<Self, DomainError> {
        let mut manifest = Self {
            labels,
            training,
            test,
        };
        manifest.prepare()?;
        Ok(manifest)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DomainError> {
        let mut manifest: Self = serde_yaml::from_str(text)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        manifest.prepare()?;
        Ok(manifest)
    }

    pub fn to_yaml_string(&self) -> Result<String, DomainError> {
        serde_yaml::to_string(self).map_err(|err| DomainError::Serialization(err.to_string()))
    }

    /// Numbers records and checks every genre name against the label table.
    pub fn prepare(&mut self) -> Result<(), DomainError> {
        number_records(&mut self.training);
        number_records(&mut self.test);
        self.validate()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for record in &self.training {
            match &record.genre {
                Some(name) => {
                    self.labels.resolve(name)?;
                }
                None => {
                    return Err(DomainError::validation(format!(
                        "training track {} has no genre",
                        record.display_path()
                    )))
                }
            }
        }
        for record in &self.test {
            if let Some(name) = &record.genre {
                self.labels.resolve(name)?;
            }
        }
        Ok(())
    }

    /// Genre id of a training record.
    pub fn label_of(&self, record: &TrackRecord) -> Result<GenreId, DomainError> {
        let name = record.genre.as_deref().ok_or_else(|| {
            DomainError::validation(format!("track {} has no genre", record.display_path()))
        })?;
        self.labels.resolve(name)
    }

    /// Rebases relative record paths onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for record in self.training.iter_mut().chain(self.test.iter_mut()) {
            if record.path.is_relative() {
                record.path = base.join(&record.path);
            }
        }
    }
}
