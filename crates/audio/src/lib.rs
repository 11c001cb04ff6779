pub mod analysis;
pub mod dsp;
pub mod error;
pub mod filters;
pub mod harmonic;
pub mod io;
pub mod loader;
pub mod resample;
pub mod rhythm;
pub mod spectral;

pub use analysis::{FeatureConfig, FeatureExtractor};
pub use error::AudioError;
pub use io::{AudioDecoder, DecodedAudio, Waveform};
pub use loader::{FileSource, LoadBatch, LoadConfig, LoadedTrack, TrackLoader, WaveformSource};
pub use resample::{Resampler, DEFAULT_SAMPLE_RATE};
pub use rhythm::{BeatTrack, TempoParams};
pub use spectral::ContrastParams;
