//! Onset strength, global tempo estimation and dynamic-programming beat
//! tracking.

use ndarray::Array2;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::{convolve_same, hann_window, power_to_db};
use crate::error::{AudioError, Result};
use crate::spectral::TOP_DB;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoParams {
    /// Center of the log-normal tempo prior.
    pub start_bpm: f64,
    /// Prior width in octaves.
    pub std_bpm: f64,
    pub max_tempo: f64,
    /// Autocorrelation window in seconds.
    pub ac_size: f64,
    /// How strictly beats must follow the estimated period.
    pub tightness: f64,
}

impl TempoParams {
    /// Autocorrelation window in onset frames at the given frame rate.
    pub fn ac_window(&self, sample_rate: u32, hop_length: usize) -> usize {
        (self.ac_size * sample_rate as f64 / hop_length as f64).floor() as usize
    }
}

impl Default for TempoParams {
    fn default() -> Self {
        Self {
            start_bpm: 120.0,
            std_bpm: 1.0,
            max_tempo: 320.0,
            ac_size: 8.0,
            tightness: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BeatTrack {
    pub tempo: f64,
    /// Frame indices of detected beats.
    pub beats: Vec<usize>,
}

/// Mean positive change of the dB mel spectrogram between consecutive
/// frames. The first `1 + n_fft / (2 * hop)` frames are zero so values line
/// up with centered frames.
pub fn onset_strength(mel_power: &Array2<f32>, n_fft: usize, hop_length: usize) -> Vec<f32> {
    let db = power_to_db(mel_power, Some(TOP_DB));
    let (bands, frames) = db.dim();
    let pad = 1 + n_fft / (2 * hop_length);
    let mut envelope = vec![0.0f32; frames];
    if bands == 0 {
        return envelope;
    }
    for (j, slot) in envelope.iter_mut().skip(pad).enumerate() {
        if j + 1 >= frames {
            break;
        }
        let rise: f32 = (0..bands)
            .map(|b| (db[[b, j + 1]] - db[[b, j]]).max(0.0))
            .sum();
        *slot = rise / bands as f32;
    }
    envelope
}

/// Pads both ends with a ramp from zero to the edge value.
fn pad_linear_ramp(signal: &[f32], pad: usize) -> Vec<f32> {
    let first = signal.first().copied().unwrap_or(0.0);
    let last = signal.last().copied().unwrap_or(0.0);
    let mut out = Vec::with_capacity(signal.len() + 2 * pad);
    out.extend((0..pad).map(|i| first * i as f32 / pad as f32));
    out.extend_from_slice(signal);
    out.extend((0..pad).map(|j| last * (pad - 1 - j) as f32 / pad as f32));
    out
}

/// Windowed autocorrelation of the envelope, each frame normalized to a
/// peak of 1, averaged over frames. Index is the lag in frames.
fn mean_autocorrelation(envelope: &[f32], window_len: usize) -> Result<Vec<f64>> {
    let padded = pad_linear_ramp(envelope, window_len / 2);
    if padded.len() < window_len {
        return Err(AudioError::InvalidParameter(format!(
            "onset envelope of {} frames is shorter than the autocorrelation window",
            envelope.len()
        )));
    }
    let fft_len = 2 * window_len;
    let mut planner = RealFftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);
    let mut time = forward.make_input_vec();
    let mut spectrum = forward.make_output_vec();
    let mut lags = inverse.make_output_vec();
    let window = hann_window(window_len);

    let frames = padded.len() - window_len + 1;
    let mut sum = vec![0.0f64; window_len];
    for start in 0..frames {
        time.iter_mut().for_each(|v| *v = 0.0);
        for ((slot, value), w) in time
            .iter_mut()
            .zip(&padded[start..start + window_len])
            .zip(&window)
        {
            *slot = value * w;
        }
        forward
            .process(&mut time, &mut spectrum)
            .map_err(|e| AudioError::Fft(e.to_string()))?;
        for bin in spectrum.iter_mut() {
            *bin = realfft::num_complex::Complex::new(bin.norm_sqr(), 0.0);
        }
        inverse
            .process(&mut spectrum, &mut lags)
            .map_err(|e| AudioError::Fft(e.to_string()))?;

        let peak = lags[..window_len]
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        let scale = if peak > f32::MIN_POSITIVE { peak } else { 1.0 };
        for (acc, value) in sum.iter_mut().zip(&lags[..window_len]) {
            *acc += (*value / scale) as f64;
        }
    }
    Ok(sum.into_iter().map(|v| v / frames as f64).collect())
}

/// Global tempo in BPM: the autocorrelation lag maximizing
/// `log1p(1e6 * ac) + log-normal prior`.
pub fn estimate_tempo(
    envelope: &[f32],
    sample_rate: u32,
    hop_length: usize,
    params: &TempoParams,
) -> Result<f64> {
    let ac_window = params.ac_window(sample_rate, hop_length);
    if ac_window < 2 {
        return Err(AudioError::InvalidParameter(format!(
            "autocorrelation window of {}s spans fewer than 2 frames",
            params.ac_size
        )));
    }
    let autocorrelation = mean_autocorrelation(envelope, ac_window)?;
    let frame_rate = sample_rate as f64 / hop_length as f64;

    let mut best_lag = None;
    let mut best_score = f64::NEG_INFINITY;
    for (lag, &strength) in autocorrelation.iter().enumerate().skip(1) {
        let bpm = 60.0 * frame_rate / lag as f64;
        if bpm >= params.max_tempo {
            continue;
        }
        let prior =
            -0.5 * ((bpm.log2() - params.start_bpm.log2()) / params.std_bpm).powi(2);
        let score = (1e6 * strength.max(0.0)).ln_1p() + prior;
        if score > best_score {
            best_score = score;
            best_lag = Some(lag);
        }
    }

    let lag = best_lag.ok_or_else(|| {
        AudioError::InvalidParameter("no autocorrelation lag below the maximum tempo".into())
    })?;
    Ok(60.0 * frame_rate / lag as f64)
}

fn sample_std(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (values.len() - 1) as f32;
    variance.sqrt()
}

/// Best predecessor for every frame, and the cumulative score of the best
/// beat sequence ending there.
fn beat_dp(local: &[f32], period: usize, tightness: f64) -> (Vec<isize>, Vec<f32>) {
    let p = period as isize;
    let nearest = -((period as f64 / 2.0).round() as isize);
    let offsets: Vec<isize> = (-2 * p..=nearest).collect();
    let transition: Vec<f32> = offsets
        .iter()
        .map(|&offset| (-tightness * (-(offset as f64) / period as f64).ln().powi(2)) as f32)
        .collect();

    let threshold = 0.01 * local.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let mut backlink = vec![-1isize; local.len()];
    let mut cumulative = vec![0.0f32; local.len()];
    let mut first_beat = true;

    for (i, &score) in local.iter().enumerate() {
        let mut best = 0usize;
        let mut best_value = f32::NEG_INFINITY;
        for (k, (&offset, &weight)) in offsets.iter().zip(&transition).enumerate() {
            let predecessor = i as isize + offset;
            let value = if predecessor >= 0 {
                weight + cumulative[predecessor as usize]
            } else {
                weight
            };
            if value > best_value {
                best_value = value;
                best = k;
            }
        }
        cumulative[i] = score + best_value;
        if first_beat && score < threshold {
            backlink[i] = -1;
        } else {
            backlink[i] = i as isize + offsets[best];
            first_beat = false;
        }
    }
    (backlink, cumulative)
}

/// Last local maximum of the cumulative score above half the median peak.
fn last_beat(cumulative: &[f32]) -> usize {
    let n = cumulative.len();
    let is_peak = |i: usize| {
        let prev = if i == 0 { cumulative[0] } else { cumulative[i - 1] };
        let next = if i + 1 == n { cumulative[i] } else { cumulative[i + 1] };
        cumulative[i] > prev && cumulative[i] >= next
    };
    let mut peaks: Vec<f32> = (0..n).filter(|&i| is_peak(i)).map(|i| cumulative[i]).collect();
    if peaks.is_empty() {
        return n.saturating_sub(1);
    }
    peaks.sort_by(|a, b| a.total_cmp(b));
    let mid = peaks.len() / 2;
    let median = if peaks.len() % 2 == 0 {
        0.5 * (peaks[mid - 1] + peaks[mid])
    } else {
        peaks[mid]
    };
    let threshold = 0.5 * median;
    (0..n)
        .rev()
        .find(|&i| {
            let value = if is_peak(i) { cumulative[i] } else { 0.0 };
            value >= threshold
        })
        .unwrap_or(n.saturating_sub(1))
}

/// Drops weak beats at the start and end of the sequence.
fn trim_beats(local: &[f32], beats: Vec<usize>) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let strengths: Vec<f32> = beats.iter().map(|&b| local[b]).collect();
    let smooth = convolve_same(&strengths, &[0.0, 0.5, 1.0, 0.5, 0.0]);
    let threshold = 0.5 * (smooth.iter().map(|v| v * v).sum::<f32>() / smooth.len() as f32).sqrt();
    let first = smooth.iter().position(|&v| v > threshold);
    let last = smooth.iter().rposition(|&v| v > threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

/// Estimates the tempo, then picks beat frames that sit on strong onsets
/// while keeping a near-constant period.
pub fn track_beats(
    envelope: &[f32],
    sample_rate: u32,
    hop_length: usize,
    params: &TempoParams,
) -> Result<BeatTrack> {
    if envelope.iter().all(|&v| v == 0.0) {
        debug!("onset envelope is silent, no beats");
        return Ok(BeatTrack {
            tempo: 0.0,
            beats: Vec::new(),
        });
    }

    let tempo = estimate_tempo(envelope, sample_rate, hop_length, params)?;
    let frame_rate = sample_rate as f64 / hop_length as f64;
    let period = ((60.0 * frame_rate / tempo).round() as usize).max(1);

    let norm = sample_std(envelope) + f32::MIN_POSITIVE;
    let normalized: Vec<f32> = envelope.iter().map(|v| v / norm).collect();
    let kernel: Vec<f32> = (-(period as isize)..=period as isize)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period as f64).powi(2)).exp() as f32)
        .collect();
    let local = convolve_same(&normalized, &kernel);

    let (backlink, cumulative) = beat_dp(&local, period, params.tightness);
    let mut beats = vec![last_beat(&cumulative)];
    while let Some(&current) = beats.last() {
        let previous = backlink[current];
        if previous < 0 {
            break;
        }
        beats.push(previous as usize);
    }
    beats.reverse();
    let beats = trim_beats(&local, beats);

    debug!(tempo, period, beats = beats.len(), "tracked beats");
    Ok(BeatTrack { tempo, beats })
}
