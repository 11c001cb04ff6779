use std::fs;
use std::path::{Path, PathBuf};

use cadence_audio::{FeatureConfig, LoadConfig};
use cadence_classify::ClassifierConfig;
use cadence_domain::DatasetManifest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// What to do when some tracks cannot be decoded.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailurePolicy {
    /// Log the failure and work with the tracks that did load.
    #[default]
    Continue,
    /// Stop before extraction and name the failed tracks.
    Abort,
}

/// Everything a run needs: the dataset plus optional tuning sections.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub dataset: DatasetManifest,
    #[serde(default)]
    pub loading: LoadConfig,
    #[serde(default)]
    pub extraction: FeatureConfig,
    #[serde(default)]
    pub classifiers: ClassifierConfig,
    #[serde(default)]
    pub on_load_failure: LoadFailurePolicy,
}

impl PipelineConfig {
    pub fn new(dataset: DatasetManifest) -> Self {
        Self {
            dataset,
            loading: LoadConfig::default(),
            extraction: FeatureConfig::default(),
            classifiers: ClassifierConfig::default(),
            on_load_failure: LoadFailurePolicy::default(),
        }
    }

    /// Reads YAML, or JSON when the file ends in `.json`. Relative track
    /// paths are resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PipelineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let parsed: std::result::Result<Self, String> = if is_json {
            serde_json::from_str(&text).map_err(|err| err.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|err| err.to_string())
        };
        let mut config = parsed.map_err(|reason| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.prepare(&base)?;
        debug!(
            path = %path.display(),
            training = config.dataset.training.len(),
            test = config.dataset.test.len(),
            "loaded pipeline config"
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str, base: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self =
            serde_yaml::from_str(text).map_err(|err| PipelineError::ConfigParse {
                path: PathBuf::from("<inline>"),
                reason: err.to_string(),
            })?;
        config.prepare(&base.into())?;
        Ok(config)
    }

    fn prepare(&mut self, base: &Path) -> Result<()> {
        self.dataset.prepare()?;
        self.dataset.resolve_paths(base);
        self.extraction.validate()?;
        Ok(())
    }
}
