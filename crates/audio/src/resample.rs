//! Sample-rate conversion of mono waveforms using rubato.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use crate::error::{AudioError, Result};
use crate::io::Waveform;

/// Analysis rate used unless the configuration asks otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

pub struct Resampler;

impl Resampler {
    /// Converts `waveform` to `target_rate`. The output length is
    /// `ceil(len * target / source)` with the filter delay removed.
    pub fn resample(waveform: &Waveform, target_rate: u32) -> Result<Waveform> {
        if target_rate == 0 {
            return Err(AudioError::InvalidParameter(
                "target sample rate must be positive".into(),
            ));
        }
        if waveform.sample_rate == target_rate || waveform.is_empty() {
            return Ok(Waveform::new(waveform.samples.clone(), target_rate));
        }

        let ratio = target_rate as f64 / waveform.sample_rate as f64;
        let input_frames = waveform.len();
        let expected = (input_frames as f64 * ratio).ceil() as usize;
        debug!(
            from = waveform.sample_rate,
            to = target_rate,
            input_frames,
            "resampling waveform"
        );

        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            1,
        )
        .map_err(|e| AudioError::Resample(format!("failed to create resampler: {e}")))?;

        let delay = resampler.output_delay();
        let input: [&[f32]; 1] = [waveform.samples.as_slice()];
        let mut output = resampler
            .process(&input[..], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?
            .swap_remove(0);
        let tail = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?
            .swap_remove(0);
        output.extend(tail);

        let mut samples: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
        samples.resize(expected, 0.0);
        Ok(Waveform::new(samples, target_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_a_copy() {
        let waveform = Waveform::new(vec![0.1, 0.2, 0.3], 22_050);
        let out = Resampler::resample(&waveform, 22_050).unwrap();
        assert_eq!(out, waveform);
    }

    #[test]
    fn downsampling_halves_length() {
        let samples: Vec<f32> = (0..44_100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect();
        let waveform = Waveform::new(samples, 44_100);
        let out = Resampler::resample(&waveform, 22_050).unwrap();
        assert_eq!(out.sample_rate, 22_050);
        assert_eq!(out.len(), 22_050);
        let peak = out.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.8 && peak < 1.2, "peak {peak}");
    }

    #[test]
    fn zero_target_rate_is_rejected() {
        let waveform = Waveform::new(vec![0.0; 8], 8_000);
        assert!(Resampler::resample(&waveform, 0).is_err());
    }
}
