use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

pub const FEATURE_COUNT: usize = 6;

/// Field names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["mfcc", "tempo", "chroma", "mel", "contrast", "tonnetz"];

/// Six scalar summaries of one track, each the mean of a feature matrix
/// over time and then over its rows (tempo is already scalar).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub mfcc: f64,
    /// Beats per minute.
    pub tempo: f64,
    pub chroma: f64,
    pub mel: f64,
    pub contrast: f64,
    pub tonnetz: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.mfcc,
            self.tempo,
            self.chroma,
            self.mel,
            self.contrast,
            self.tonnetz,
        ]
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, DomainError> {
        match *values {
            [mfcc, tempo, chroma, mel, contrast, tonnetz] => Ok(Self {
                mfcc,
                tempo,
                chroma,
                mel,
                contrast,
                tonnetz,
            }),
            _ => Err(DomainError::validation(format!(
                "feature vector needs {FEATURE_COUNT} values, got {}",
                values.len()
            ))),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|value| value.is_finite())
    }

    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        let [mfcc, tempo, chroma, mel, contrast, tonnetz] = values;
        Self {
            mfcc,
            tempo,
            chroma,
            mel,
            contrast,
            tonnetz,
        }
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in FEATURE_NAMES.iter().zip(self.to_array()).enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value:.6}")?;
        }
        Ok(())
    }
}
