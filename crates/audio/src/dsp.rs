use ndarray::{Array2, Axis};
use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

use crate::error::{AudioError, Result};

/// Floor applied before taking logarithms of power values.
pub const AMIN: f32 = 1e-10;

/// Periodic Hann window.
pub fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Mirror index without repeating the edge sample (`c b | a b c | b a`).
fn reflect_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded >= len as isize {
        (period - folded) as usize
    } else {
        folded as usize
    }
}

/// Mirror index repeating the edge sample (`b a | a b c | c b`).
fn symmetric_index(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let folded = index.rem_euclid(period);
    if folded >= len as isize {
        (period - 1 - folded) as usize
    } else {
        folded as usize
    }
}

fn pad_reflect(signal: &[f32], pad: usize) -> Vec<f32> {
    let len = signal.len();
    (-(pad as isize)..(len + pad) as isize)
        .map(|i| signal[reflect_index(i, len)])
        .collect()
}

/// Complex spectrogram of centered, Hann-windowed frames. Rows are
/// frequency bins (`n_fft / 2 + 1`), columns are frames.
#[derive(Debug, Clone)]
pub struct Stft {
    pub n_fft: usize,
    pub hop_length: usize,
    pub spectrum: Array2<Complex<f32>>,
}

impl Stft {
    pub fn compute(signal: &[f32], n_fft: usize, hop_length: usize) -> Result<Self> {
        if signal.is_empty() {
            return Err(AudioError::EmptySignal);
        }
        if n_fft < 2 || n_fft % 2 != 0 {
            return Err(AudioError::InvalidParameter(format!(
                "n_fft must be even and at least 2, got {n_fft}"
            )));
        }
        if hop_length == 0 {
            return Err(AudioError::InvalidParameter(
                "hop length must be positive".into(),
            ));
        }

        let mut padded = pad_reflect(signal, n_fft / 2);
        if padded.len() < n_fft {
            padded.resize(n_fft, 0.0);
        }
        let frames = 1 + (padded.len() - n_fft) / hop_length;
        let bins = n_fft / 2 + 1;

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(n_fft);
        let window = hann_window(n_fft);
        let mut input = r2c.make_input_vec();
        let mut output = r2c.make_output_vec();
        let mut spectrum = Array2::from_elem((bins, frames), Complex::new(0.0, 0.0));

        for (t, mut column) in spectrum.axis_iter_mut(Axis(1)).enumerate() {
            let start = t * hop_length;
            for ((slot, sample), w) in input
                .iter_mut()
                .zip(&padded[start..start + n_fft])
                .zip(&window)
            {
                *slot = sample * w;
            }
            r2c.process(&mut input, &mut output)
                .map_err(|e| AudioError::Fft(e.to_string()))?;
            for (dst, src) in column.iter_mut().zip(&output) {
                *dst = *src;
            }
        }

        Ok(Self {
            n_fft,
            hop_length,
            spectrum,
        })
    }

    pub fn bins(&self) -> usize {
        self.spectrum.nrows()
    }

    pub fn frames(&self) -> usize {
        self.spectrum.ncols()
    }

    pub fn magnitude(&self) -> Array2<f32> {
        self.spectrum.mapv(|c| c.norm())
    }

    pub fn power(&self) -> Array2<f32> {
        self.spectrum.mapv(|c| c.norm_sqr())
    }

    /// Overlap-add inverse of a spectrum with this transform's geometry,
    /// trimmed to `length` samples.
    pub fn inverse(&self, spectrum: &Array2<Complex<f32>>, length: usize) -> Result<Vec<f32>> {
        if spectrum.dim() != self.spectrum.dim() {
            return Err(AudioError::InvalidParameter(format!(
                "spectrum shape {:?} does not match transform {:?}",
                spectrum.dim(),
                self.spectrum.dim()
            )));
        }
        let n_fft = self.n_fft;
        let hop = self.hop_length;
        let frames = spectrum.ncols();
        let total = n_fft + hop * frames.saturating_sub(1);

        let mut planner = RealFftPlanner::<f32>::new();
        let c2r = planner.plan_fft_inverse(n_fft);
        let window = hann_window(n_fft);
        let mut buffer = c2r.make_input_vec();
        let mut output = c2r.make_output_vec();
        let mut signal = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let scale = 1.0 / n_fft as f32;

        for (t, column) in spectrum.axis_iter(Axis(1)).enumerate() {
            for (dst, src) in buffer.iter_mut().zip(column.iter()) {
                *dst = *src;
            }
            buffer[0].im = 0.0;
            if let Some(last) = buffer.last_mut() {
                last.im = 0.0;
            }
            c2r.process(&mut buffer, &mut output)
                .map_err(|e| AudioError::Fft(e.to_string()))?;
            let start = t * hop;
            for (k, (value, w)) in output.iter().zip(&window).enumerate() {
                signal[start + k] += value * scale * w;
                window_sum[start + k] += w * w;
            }
        }

        for (sample, norm) in signal.iter_mut().zip(&window_sum) {
            if *norm > f32::MIN_POSITIVE {
                *sample /= norm;
            }
        }

        let mut trimmed: Vec<f32> = signal.into_iter().skip(n_fft / 2).take(length).collect();
        trimmed.resize(length, 0.0);
        Ok(trimmed)
    }
}

/// `10 * log10(S)` with a floor of [`AMIN`], optionally clipped to
/// `top_db` below the peak.
pub fn power_to_db(power: &Array2<f32>, top_db: Option<f32>) -> Array2<f32> {
    let mut db = power.mapv(|value| 10.0 * value.max(AMIN).log10());
    if let Some(top_db) = top_db {
        let peak = db.fold(f32::NEG_INFINITY, |acc, &value| acc.max(value));
        db.mapv_inplace(|value| value.max(peak - top_db));
    }
    db
}

/// Sliding median of odd width `size` along `axis`, edges mirrored.
pub fn median_filter(data: &Array2<f32>, size: usize, axis: Axis) -> Array2<f32> {
    let mut out = Array2::zeros(data.raw_dim());
    let half = (size / 2) as isize;
    let mut window = Vec::with_capacity(size);
    for (lane, mut out_lane) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let len = lane.len();
        for i in 0..len {
            window.clear();
            for offset in -half..=half {
                window.push(lane[symmetric_index(i as isize + offset, len)]);
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            out_lane[i] = *median;
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Norm {
    Max,
    L1,
    L2,
}

/// Scales each column to unit norm; columns whose norm underflows are left
/// untouched.
pub fn normalize_columns(data: &mut Array2<f32>, norm: Norm) {
    for mut column in data.axis_iter_mut(Axis(1)) {
        let length = match norm {
            Norm::Max => column.iter().fold(0.0f32, |acc, v| acc.max(v.abs())),
            Norm::L1 => column.iter().map(|v| v.abs()).sum(),
            Norm::L2 => column.iter().map(|v| v * v).sum::<f32>().sqrt(),
        };
        if length > f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / length);
        }
    }
}

/// Averages each row over time, then averages the row means.
pub fn mean_over_time_then_rows(data: &Array2<f32>) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let row_means: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| v as f64).sum::<f64>() / row.len() as f64)
        .collect();
    row_means.iter().sum::<f64>() / row_means.len() as f64
}

/// Convolution truncated to the input length and centered on the kernel.
pub fn convolve_same(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let n = signal.len() as isize;
    let m = kernel.len() as isize;
    let offset = (m - 1) / 2;
    (0..n)
        .map(|i| {
            let center = i + offset;
            (0..m)
                .filter_map(|j| {
                    let idx = center - j;
                    (0..n).contains(&idx).then(|| kernel[j as usize] * signal[idx as usize])
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn window_is_periodic() {
        let window = hann_window(4);
        assert_abs_diff_eq!(window[0], 0.0);
        assert_abs_diff_eq!(window[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(window[2], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(window[3], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn reflect_padding_mirrors_without_edge() {
        assert_eq!(pad_reflect(&[1.0, 2.0, 3.0], 2), vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn stft_shape_and_peak_bin() {
        let signal = sine(1000.0, 22_050, 22_050);
        let stft = Stft::compute(&signal, 2048, 512).unwrap();
        assert_eq!(stft.bins(), 1025);
        assert_eq!(stft.frames(), 1 + 22_050 / 512);
        let magnitude = stft.magnitude();
        let column = magnitude.column(stft.frames() / 2);
        let peak = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        let expected = (1000.0 * 2048.0 / 22_050.0f32).round() as usize;
        assert!((peak as isize - expected as isize).abs() <= 1);
    }

    #[test]
    fn inverse_reconstructs_signal() {
        let signal = sine(440.0, 22_050, 8_000);
        let stft = Stft::compute(&signal, 2048, 512).unwrap();
        let rebuilt = stft.inverse(&stft.spectrum, signal.len()).unwrap();
        assert_eq!(rebuilt.len(), signal.len());
        for (a, b) in rebuilt.iter().zip(&signal).skip(1024).take(4096) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn empty_signal_is_rejected() {
        assert!(matches!(
            Stft::compute(&[], 2048, 512),
            Err(AudioError::EmptySignal)
        ));
    }

    #[test]
    fn db_conversion_clips_to_top_db() {
        let power = array![[1.0f32, 1e-12], [100.0, 0.1]];
        let db = power_to_db(&power, Some(80.0));
        assert_abs_diff_eq!(db[[0, 0]], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(db[[1, 0]], 20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(db[[0, 1]], -60.0, epsilon = 1e-5);
        assert_abs_diff_eq!(db[[1, 1]], -10.0, epsilon = 1e-5);
    }

    #[test]
    fn median_filter_removes_spikes_along_axis() {
        let data = array![[0.0f32, 0.0, 9.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0, 1.0]];
        let along_time = median_filter(&data, 3, Axis(1));
        assert_eq!(along_time.row(0).to_vec(), vec![0.0; 5]);
        assert_eq!(along_time.row(1).to_vec(), vec![1.0; 5]);
        let along_freq = median_filter(&data, 3, Axis(0));
        assert_eq!(along_freq[[0, 2]], 9.0);
    }

    #[test]
    fn normalization_skips_silent_columns() {
        let mut data = array![[2.0f32, 0.0], [4.0, 0.0]];
        normalize_columns(&mut data, Norm::Max);
        assert_eq!(data, array![[0.5, 0.0], [1.0, 0.0]]);
        let mut data = array![[1.0f32], [3.0]];
        normalize_columns(&mut data, Norm::L1);
        assert_abs_diff_eq!(data[[1, 0]], 0.75);
    }

    #[test]
    fn convolution_keeps_input_length() {
        let out = convolve_same(&[0.0, 1.0, 0.0, 0.0], &[0.5, 1.0, 0.5]);
        assert_eq!(out, vec![0.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn summary_mean_averages_rows() {
        let data = array![[1.0f32, 3.0], [5.0, 7.0]];
        assert_abs_diff_eq!(mean_over_time_then_rows(&data), 4.0);
    }
}
