use cadence_audio::{FeatureExtractor, LoadedTrack, TrackLoader, WaveformSource};
use cadence_classify::{ClassifierConfig, TrainingSet};
use cadence_domain::{
    ClassificationReport, ClassifierResult, DatasetManifest, LoadReport, TrackFeatures,
    TrackPrediction,
};
use tracing::{info, instrument, warn};

use crate::config::{LoadFailurePolicy, PipelineConfig};
use crate::error::{PipelineError, Result};

/// Loads both track lists, extracts features and runs every enabled
/// classifier.
pub struct GenrePipeline {
    config: PipelineConfig,
    extractor: FeatureExtractor,
}

impl GenrePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new(config.extraction.clone())?;
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs against files on disk.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<ClassificationReport> {
        let loader = TrackLoader::from_config(self.config.loading.clone());
        self.run_with(&loader)
    }

    pub fn run_with<S: WaveformSource>(
        &self,
        loader: &TrackLoader<S>,
    ) -> Result<ClassificationReport> {
        let dataset = &self.config.dataset;
        info!(
            training = dataset.training.len(),
            test = dataset.test.len(),
            "loading tracks"
        );
        let training = loader.load_all(&dataset.training);
        let test = loader.load_all(&dataset.test);
        self.check_failures(&[&training.report, &test.report])?;

        info!("processing audio features");
        let training_features = self.extract(&training.tracks)?;
        let test_features = self.extract(&test.tracks)?;

        let mut report = classify_features(
            dataset,
            &self.config.classifiers,
            training_features,
            test_features,
        )?;
        report.training_load = training.report;
        report.test_load = test.report;
        Ok(report)
    }

    /// Classification stage alone, on features computed elsewhere.
    pub fn classify_features(
        &self,
        training: Vec<TrackFeatures>,
        test: Vec<TrackFeatures>,
    ) -> Result<ClassificationReport> {
        classify_features(&self.config.dataset, &self.config.classifiers, training, test)
    }

    fn check_failures(&self, reports: &[&LoadReport]) -> Result<()> {
        let failed: Vec<String> = reports
            .iter()
            .flat_map(|report| report.failures())
            .map(|entry| entry.path.display().to_string())
            .collect();
        if failed.is_empty() {
            return Ok(());
        }
        match self.config.on_load_failure {
            LoadFailurePolicy::Continue => {
                warn!(failed = failed.len(), "continuing without tracks that failed to load");
                Ok(())
            }
            LoadFailurePolicy::Abort => Err(PipelineError::LoadAborted(failed)),
        }
    }

    fn extract(&self, tracks: &[LoadedTrack]) -> Result<Vec<TrackFeatures>> {
        tracks
            .iter()
            .map(|track| {
                let features = self.extractor.extract(&track.waveform)?;
                info!(path = %track.record.display_path(), %features, "features extracted");
                Ok(TrackFeatures {
                    id: track.record.id,
                    path: track.record.path.clone(),
                    features,
                })
            })
            .collect()
    }
}

/// Pairs each training feature vector with its own record's genre, fits
/// every enabled classifier and predicts the test tracks.
pub fn classify_features(
    dataset: &DatasetManifest,
    classifiers: &ClassifierConfig,
    training_features: Vec<TrackFeatures>,
    test_features: Vec<TrackFeatures>,
) -> Result<ClassificationReport> {
    let mut training = TrainingSet::new();
    for track in &training_features {
        let record = dataset
            .training
            .get(track.id.0)
            .ok_or_else(|| PipelineError::UnknownTrack(track.path.display().to_string()))?;
        training.push(track.features, dataset.label_of(record)?);
    }
    let samples: Vec<_> = test_features.iter().map(|track| track.features).collect();

    let mut report = ClassificationReport::new(dataset.labels.clone());
    for mut model in classifiers.build() {
        model.fit(&training)?;
        let assignments = model.predict(&samples)?;
        let predictions = test_features
            .iter()
            .zip(assignments)
            .map(|(track, assignment)| {
                let expected = dataset
                    .test
                    .get(track.id.0)
                    .and_then(|record| record.genre.clone());
                info!(
                    classifier = model.name(),
                    path = %track.path.display(),
                    genre = %report.genre_name(&assignment),
                    "classified"
                );
                TrackPrediction {
                    id: track.id,
                    path: track.path.clone(),
                    assignment,
                    expected,
                }
            })
            .collect();
        report.classifiers.push(ClassifierResult {
            name: model.name().to_string(),
            heading: model.heading().to_string(),
            predictions,
        });
    }

    report.training_features = training_features;
    report.test_features = test_features;
    Ok(report)
}
