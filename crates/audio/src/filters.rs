//! Filterbanks and transform matrices shared by the spectral features.

use ndarray::Array2;

/// Center frequency of each STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    let min_log_mel = MEL_MIN_LOG_HZ / MEL_F_SP;
    if hz >= MEL_MIN_LOG_HZ {
        min_log_mel + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    let min_log_mel = MEL_MIN_LOG_HZ / MEL_F_SP;
    if mel >= min_log_mel {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - min_log_mel)).exp()
    } else {
        MEL_F_SP * mel
    }
}

/// Triangular mel filters with Slaney area normalization, shape
/// `(n_mels, n_fft / 2 + 1)`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let min_mel = hz_to_mel(fmin);
    let max_mel = hz_to_mel(fmax);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, fft_freqs.len()));
    for m in 0..n_mels {
        let lower_edge = mel_points[m];
        let center = mel_points[m + 1];
        let upper_edge = mel_points[m + 2];
        let enorm = 2.0 / (upper_edge - lower_edge);
        for (bin, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - lower_edge) / (center - lower_edge);
            let upper = (upper_edge - freq) / (upper_edge - center);
            let weight = lower.min(upper).max(0.0);
            weights[[m, bin]] = (weight * enorm) as f32;
        }
    }
    weights
}

fn hz_to_octs(hz: f64, tuning: f64, bins_per_octave: usize) -> f64 {
    let a440 = 440.0 * 2f64.powf(tuning / bins_per_octave as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Gaussian pitch-class filters, shape `(n_chroma, n_fft / 2 + 1)`, rows
/// starting at C. Each bin is L2-normalized across classes, then weighted
/// by a Gaussian over octaves centered on octave 5.
pub fn chroma_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_chroma: usize,
    tuning: f64,
) -> Array2<f32> {
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;

    let n_chroma_f = n_chroma as f64;
    let mut freq_bins = Vec::with_capacity(n_fft);
    for k in 1..n_fft {
        let hz = k as f64 * sample_rate as f64 / n_fft as f64;
        freq_bins.push(n_chroma_f * hz_to_octs(hz, tuning, n_chroma));
    }
    freq_bins.insert(0, freq_bins[0] - 1.5 * n_chroma_f);

    let mut bin_widths: Vec<f64> = freq_bins
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(1.0))
        .collect();
    bin_widths.push(1.0);

    let half = (n_chroma_f / 2.0).round();
    let mut weights = Array2::<f64>::zeros((n_chroma, n_fft));
    for (bin, (&position, &width)) in freq_bins.iter().zip(&bin_widths).enumerate() {
        for class in 0..n_chroma {
            let distance =
                (position - class as f64 + half + 10.0 * n_chroma_f).rem_euclid(n_chroma_f) - half;
            weights[[class, bin]] = (-0.5 * (2.0 * distance / width).powi(2)).exp();
        }
    }

    for (bin, &position) in freq_bins.iter().enumerate() {
        let mut column = weights.column_mut(bin);
        let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            column.mapv_inplace(|w| w / norm);
        }
        let octave_weight =
            (-0.5 * ((position / n_chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        column.mapv_inplace(|w| w * octave_weight);
    }

    // Rotate so row 0 is C rather than A.
    let shift = 3 * (n_chroma / 12);
    let bins = n_fft / 2 + 1;
    Array2::from_shape_fn((n_chroma, bins), |(class, bin)| {
        weights[[(class + shift) % n_chroma, bin]] as f32
    })
}

/// Orthonormal type-II DCT matrix, shape `(n_out, n_in)`.
pub fn dct_matrix(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
        (scale * angle.cos()) as f32
    })
}

/// Projection of 12 pitch classes onto the circles of fifths, minor thirds
/// and major thirds (two coordinates each).
pub fn tonnetz_matrix(n_chroma: usize) -> Array2<f32> {
    const SCALE: [f64; 6] = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];
    const RADIUS: [f64; 6] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];
    Array2::from_shape_fn((6, n_chroma), |(dim, class)| {
        let position = 12.0 * class as f64 / n_chroma as f64;
        let mut angle = SCALE[dim] * position;
        if dim % 2 == 0 {
            angle -= 0.5;
        }
        (RADIUS[dim] * (std::f64::consts::PI * angle).cos()) as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mel_scale_round_trips_across_break() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 11_025.0] {
            assert_abs_diff_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn mel_filters_cover_spectrum() {
        let bank = mel_filterbank(22_050, 2048, 128, 0.0, 11_025.0);
        assert_eq!(bank.dim(), (128, 1025));
        for row in bank.rows() {
            assert!(row.iter().any(|&w| w > 0.0));
            assert!(row.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn chroma_filter_peaks_at_pitch_class() {
        let bank = chroma_filterbank(22_050, 2048, 12, 0.0);
        assert_eq!(bank.dim(), (12, 1025));
        // Bin nearest A4 (440 Hz) should favor class 9 (A, counting from C).
        let bin = (440.0f64 * 2048.0 / 22_050.0).round() as usize;
        let column = bank.column(bin);
        let best = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(class, _)| class)
            .unwrap();
        assert_eq!(best, 9);
    }

    #[test]
    fn dct_rows_are_orthonormal() {
        let dct = dct_matrix(8, 8);
        for a in 0..8 {
            for b in 0..8 {
                let dot: f32 = dct
                    .row(a)
                    .iter()
                    .zip(dct.row(b).iter())
                    .map(|(x, y)| x * y)
                    .sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot, expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn tonnetz_projection_shape() {
        let phi = tonnetz_matrix(12);
        assert_eq!(phi.dim(), (6, 12));
        // Fifths coordinate for C: cos(-pi / 2) is zero.
        assert_abs_diff_eq!(phi[[0, 0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(phi[[1, 0]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(phi[[5, 0]], 0.5, epsilon = 1e-6);
    }
}
