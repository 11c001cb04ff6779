use cadence_domain::FeatureVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dsp::{mean_over_time_then_rows, Stft};
use crate::error::{AudioError, Result};
use crate::harmonic::harmonic_signal;
use crate::io::Waveform;
use crate::rhythm::{onset_strength, track_beats, TempoParams};
use crate::spectral::{chroma, mel_spectrogram, mfcc, spectral_contrast, tonnetz, ContrastParams};

/// Analysis parameters shared by every track of a run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
    pub n_chroma: usize,
    /// Median filter width for harmonic/percussive separation.
    pub hpss_kernel: usize,
    pub contrast: ContrastParams,
    pub tempo: TempoParams,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 20,
            n_chroma: 12,
            hpss_kernel: 31,
            contrast: ContrastParams::default(),
            tempo: TempoParams::default(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("n_mels", self.n_mels),
            ("n_mfcc", self.n_mfcc),
            ("n_chroma", self.n_chroma),
            ("contrast.n_bands", self.contrast.n_bands),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(AudioError::InvalidParameter(format!("{name} must be positive")));
        }
        if self.hpss_kernel % 2 == 0 {
            return Err(AudioError::InvalidParameter(format!(
                "hpss_kernel must be odd, got {}",
                self.hpss_kernel
            )));
        }
        Ok(())
    }
}

/// Reduces a waveform to the six summary features.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    #[instrument(
        skip(self, waveform),
        fields(samples = waveform.len(), sample_rate = waveform.sample_rate)
    )]
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureVector> {
        if waveform.is_empty() {
            return Err(AudioError::EmptySignal);
        }
        if waveform.sample_rate == 0 {
            return Err(AudioError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        if let Some(index) = waveform.samples.iter().position(|s| !s.is_finite()) {
            return Err(AudioError::NonFiniteSample { index });
        }
        let cfg = &self.config;
        let sr = waveform.sample_rate;

        let stft = Stft::compute(&waveform.samples, cfg.n_fft, cfg.hop_length)?;
        let power = stft.power();
        let mel = mel_spectrogram(&power, sr, cfg.n_fft, cfg.n_mels);

        let envelope = onset_strength(&mel, cfg.n_fft, cfg.hop_length);
        let rhythm = track_beats(&envelope, sr, cfg.hop_length, &cfg.tempo)?;
        debug!(tempo = rhythm.tempo, beats = rhythm.beats.len(), "rhythm");

        let contrast = spectral_contrast(&stft.magnitude(), sr, cfg.n_fft, &cfg.contrast)?;

        let harmonic = harmonic_signal(&stft, cfg.hpss_kernel, waveform.len())?;
        let harmonic_stft = Stft::compute(&harmonic, cfg.n_fft, cfg.hop_length)?;
        let harmonic_chroma = chroma(&harmonic_stft.power(), sr, cfg.n_fft, cfg.n_chroma);

        let features = FeatureVector {
            mfcc: mean_over_time_then_rows(&mfcc(&mel, cfg.n_mfcc)),
            tempo: rhythm.tempo,
            chroma: mean_over_time_then_rows(&chroma(&power, sr, cfg.n_fft, cfg.n_chroma)),
            mel: mean_over_time_then_rows(&mel),
            contrast: mean_over_time_then_rows(&contrast),
            tonnetz: mean_over_time_then_rows(&tonnetz(&harmonic_chroma)),
        };
        if !features.is_finite() {
            return Err(AudioError::NonFiniteFeatures(features.to_string()));
        }
        debug!(%features, frames = stft.frames(), "extracted features");
        Ok(features)
    }
}
