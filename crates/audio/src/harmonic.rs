//! Harmonic/percussive separation by median filtering.

use ndarray::{Array2, Axis, Zip};
use realfft::num_complex::Complex;

use crate::dsp::{median_filter, Stft};
use crate::error::Result;

/// Soft mask selecting `x` over `reference`: `x^p / (x^p + ref^p)`.
/// Bins where both are zero get a mask of 0.
fn soft_mask(x: &Array2<f32>, reference: &Array2<f32>, power: i32) -> Array2<f32> {
    let mut mask = Array2::zeros(x.raw_dim());
    Zip::from(&mut mask)
        .and(x)
        .and(reference)
        .for_each(|m, &a, &b| {
            let z = a.max(b);
            *m = if z < f32::MIN_POSITIVE {
                0.0
            } else {
                let a = (a / z).powi(power);
                let b = (b / z).powi(power);
                a / (a + b)
            };
        });
    mask
}

/// Masked spectrum keeping the components that are steady in time.
pub fn harmonic_spectrum(stft: &Stft, kernel: usize) -> Array2<Complex<f32>> {
    let magnitude = stft.magnitude();
    let harmonic = median_filter(&magnitude, kernel, Axis(1));
    let percussive = median_filter(&magnitude, kernel, Axis(0));
    let mask = soft_mask(&harmonic, &percussive, 2);
    let mut spectrum = stft.spectrum.clone();
    Zip::from(&mut spectrum)
        .and(&mask)
        .for_each(|bin, &weight| *bin *= weight);
    spectrum
}

/// Time-domain harmonic component of a signal, same length as the input.
pub fn harmonic_signal(stft: &Stft, kernel: usize, length: usize) -> Result<Vec<f32>> {
    let spectrum = harmonic_spectrum(stft, kernel);
    stft.inverse(&spectrum, length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn soft_mask_prefers_larger_component() {
        let x = array![[3.0f32, 0.0, 1.0]];
        let reference = array![[1.0f32, 0.0, 1.0]];
        let mask = soft_mask(&x, &reference, 2);
        assert!((mask[[0, 0]] - 0.9).abs() < 1e-6);
        assert_eq!(mask[[0, 1]], 0.0);
        assert!((mask[[0, 2]] - 0.5).abs() < 1e-6);
    }

    /// Squared error over samples clear of the reflect-padded edges.
    fn interior_error(a: &[f32], b: &[f32]) -> f32 {
        let interior = 4_096..40_000;
        a[interior.clone()]
            .iter()
            .zip(&b[interior])
            .map(|(x, y)| (x - y).powi(2))
            .sum()
    }

    fn tone() -> Vec<f32> {
        let sample_rate = 22_050.0f32;
        (0..44_100)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn steady_tone_survives_and_clicks_are_suppressed() {
        let clean = tone();
        let mut signal = clean.clone();
        for click in (2_000..44_100).step_by(5_000) {
            signal[click] += 1.0;
        }

        let stft = Stft::compute(&signal, 2048, 512).unwrap();
        let harmonic = harmonic_signal(&stft, 31, signal.len()).unwrap();
        assert_eq!(harmonic.len(), signal.len());

        let error_with_clicks = interior_error(&signal, &clean);
        let error_harmonic = interior_error(&harmonic, &clean);
        assert!(
            error_harmonic < 0.1 * error_with_clicks,
            "harmonic {error_harmonic} clicks {error_with_clicks}"
        );
    }

    #[test]
    fn clean_tone_passes_through_interior() {
        let clean = tone();
        let stft = Stft::compute(&clean, 2048, 512).unwrap();
        let harmonic = harmonic_signal(&stft, 31, clean.len()).unwrap();
        let energy: f32 = clean[4_096..40_000].iter().map(|x| x * x).sum();
        assert!(interior_error(&harmonic, &clean) < 0.01 * energy);
    }
}
