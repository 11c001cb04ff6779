//! Frame-wise spectral features computed from a shared STFT.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::dsp::{normalize_columns, power_to_db, Norm};
use crate::error::{AudioError, Result};
use crate::filters::{
    chroma_filterbank, dct_matrix, fft_frequencies, mel_filterbank, tonnetz_matrix,
};

/// Dynamic range kept by dB conversions.
pub const TOP_DB: f32 = 80.0;

/// Mel power spectrogram from an STFT power spectrogram.
pub fn mel_spectrogram(
    power: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
) -> Array2<f32> {
    let filters = mel_filterbank(sample_rate, n_fft, n_mels, 0.0, sample_rate as f64 / 2.0);
    filters.dot(power)
}

/// Cepstral coefficients of a mel power spectrogram.
pub fn mfcc(mel_power: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    let log_mel = power_to_db(mel_power, Some(TOP_DB));
    dct_matrix(n_mfcc, log_mel.nrows()).dot(&log_mel)
}

/// Pitch-class energy per frame, each frame scaled to a peak of 1.
pub fn chroma(
    power: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    n_chroma: usize,
) -> Array2<f32> {
    let filters = chroma_filterbank(sample_rate, n_fft, n_chroma, 0.0);
    let mut chroma = filters.dot(power);
    normalize_columns(&mut chroma, Norm::Max);
    chroma
}

/// Tonal centroid coordinates of a chromagram.
pub fn tonnetz(chroma: &Array2<f32>) -> Array2<f32> {
    let mut weights = chroma.clone();
    normalize_columns(&mut weights, Norm::L1);
    tonnetz_matrix(chroma.nrows()).dot(&weights)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContrastParams {
    pub n_bands: usize,
    pub fmin: f64,
    pub quantile: f64,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            n_bands: 6,
            fmin: 200.0,
            quantile: 0.02,
        }
    }
}

/// Peak-to-valley ratio in dB for octave bands of a magnitude spectrogram.
/// Returns `n_bands + 1` rows; the last band runs up to Nyquist.
pub fn spectral_contrast(
    magnitude: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    params: &ContrastParams,
) -> Result<Array2<f32>> {
    let freqs = fft_frequencies(sample_rate, n_fft);
    if freqs.len() != magnitude.nrows() {
        return Err(AudioError::InvalidParameter(format!(
            "magnitude has {} bins, expected {}",
            magnitude.nrows(),
            freqs.len()
        )));
    }

    let mut edges = vec![0.0];
    edges.extend((0..=params.n_bands).map(|k| params.fmin * 2f64.powi(k as i32)));
    let nyquist = sample_rate as f64 / 2.0;
    if edges[..edges.len() - 1].iter().any(|&edge| edge >= nyquist) {
        return Err(AudioError::InvalidParameter(format!(
            "contrast band edges exceed Nyquist ({nyquist} Hz)"
        )));
    }

    let frames = magnitude.ncols();
    let mut peak = Array2::<f32>::zeros((params.n_bands + 1, frames));
    let mut valley = Array2::<f32>::zeros((params.n_bands + 1, frames));
    let mut values = Vec::new();

    for band in 0..=params.n_bands {
        let (low, high) = (edges[band], edges[band + 1]);
        let mut member: Vec<bool> = freqs.iter().map(|&f| f >= low && f <= high).collect();
        let (first, last) = match (
            member.iter().position(|&m| m),
            member.iter().rposition(|&m| m),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(AudioError::InvalidParameter(format!(
                    "contrast band {low}-{high} Hz holds no FFT bins"
                )))
            }
        };
        if band > 0 && first > 0 {
            member[first - 1] = true;
        }
        if band == params.n_bands {
            member[last + 1..].iter_mut().for_each(|m| *m = true);
        }

        let mut rows: Vec<usize> = member
            .iter()
            .enumerate()
            .filter_map(|(bin, &m)| m.then_some(bin))
            .collect();
        let alpha = ((params.quantile * rows.len() as f64).round() as usize).max(1);
        if band < params.n_bands {
            rows.pop();
        }
        let alpha = alpha.min(rows.len());
        if alpha == 0 {
            continue;
        }

        for t in 0..frames {
            values.clear();
            values.extend(rows.iter().map(|&bin| magnitude[[bin, t]]));
            values.sort_by(|a, b| a.total_cmp(b));
            valley[[band, t]] = values[..alpha].iter().sum::<f32>() / alpha as f32;
            peak[[band, t]] = values[values.len() - alpha..].iter().sum::<f32>() / alpha as f32;
        }
    }

    Ok(power_to_db(&peak, Some(TOP_DB)) - power_to_db(&valley, Some(TOP_DB)))
}
