//! Batch loading of track records into analysis-ready waveforms.

use std::path::Path;

use cadence_domain::{LoadOutcome, LoadReport, TrackRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::io::{AudioDecoder, Waveform};
use crate::resample::{Resampler, DEFAULT_SAMPLE_RATE};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    /// Rate every waveform is converted to; `None` keeps the file's rate.
    pub target_sample_rate: Option<u32>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: Some(DEFAULT_SAMPLE_RATE),
        }
    }
}

/// Produces a mono waveform for a path.
pub trait WaveformSource {
    fn load(&self, path: &Path) -> Result<Waveform>;
}

/// Decodes files from disk, down-mixes and resamples them.
#[derive(Clone, Debug, Default)]
pub struct FileSource {
    config: LoadConfig,
}

impl FileSource {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }
}

impl WaveformSource for FileSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        let mono = AudioDecoder::open(path)?.to_mono();
        match self.config.target_sample_rate {
            Some(rate) => Resampler::resample(&mono, rate),
            None => Ok(mono),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadedTrack {
    pub record: TrackRecord,
    pub waveform: Waveform,
}

/// Successfully loaded tracks in request order, plus one outcome per
/// requested record.
#[derive(Clone, Debug, Default)]
pub struct LoadBatch {
    pub tracks: Vec<LoadedTrack>,
    pub report: LoadReport,
}

pub struct TrackLoader<S = FileSource> {
    source: S,
}

impl TrackLoader<FileSource> {
    pub fn from_config(config: LoadConfig) -> Self {
        Self::new(FileSource::new(config))
    }
}

impl<S: WaveformSource> TrackLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Loads every record. Failures are logged and reported, never fatal.
    pub fn load_all(&self, records: &[TrackRecord]) -> LoadBatch {
        let mut batch = LoadBatch::default();
        for record in records {
            match self.source.load(record.path()) {
                Ok(waveform) => {
                    info!(
                        path = %record.display_path(),
                        samples = waveform.len(),
                        sample_rate = waveform.sample_rate,
                        "waveform loaded"
                    );
                    batch.report.record(
                        record,
                        LoadOutcome::Loaded {
                            samples: waveform.len(),
                            sample_rate: waveform.sample_rate,
                            duration_secs: waveform.duration_secs(),
                        },
                    );
                    batch.tracks.push(LoadedTrack {
                        record: record.clone(),
                        waveform,
                    });
                }
                Err(err) => {
                    warn!(path = %record.display_path(), error = %err, "failed to load audio");
                    batch.report.record(
                        record,
                        LoadOutcome::Failed {
                            reason: err.to_string(),
                        },
                    );
                }
            }
        }
        batch
    }
}
