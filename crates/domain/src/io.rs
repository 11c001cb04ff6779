use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::report::{ClassificationReport, LoadOutcome, LoadReport, TrackFeatures};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
}

pub trait ReportExporter {
    fn export(
        &self,
        report: &ClassificationReport,
        format: ReportFormat,
    ) -> Result<Vec<u8>, DomainError>;
}

pub struct JsonExporter;

impl ReportExporter for JsonExporter {
    fn export(
        &self,
        report: &ClassificationReport,
        format: ReportFormat,
    ) -> Result<Vec<u8>, DomainError> {
        match format {
            ReportFormat::Json => serde_json::to_vec_pretty(report)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            other => Err(DomainError::validation(format!(
                "JsonExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

/// Line-oriented console rendering: load status, feature values, then one
/// block per classifier with a line per test track.
pub struct TextExporter;

impl TextExporter {
    fn write_loads(out: &mut String, load: &LoadReport) {
        for entry in &load.entries {
            let line = match &entry.outcome {
                LoadOutcome::Loaded { .. } => {
                    format!("Audio {} Waveform Loaded\n", entry.path.display())
                }
                LoadOutcome::Failed { reason } => {
                    format!("Failed to load audio {}: {}\n", entry.path.display(), reason)
                }
            };
            out.push_str(&line);
        }
    }

    fn write_features(out: &mut String, features: &[TrackFeatures]) {
        for track in features {
            out.push_str(&format!("{} {}\n", track.path.display(), track.features));
        }
    }

    pub fn render(report: &ClassificationReport) -> String {
        let mut out = String::new();
        Self::write_loads(&mut out, &report.training_load);
        Self::write_loads(&mut out, &report.test_load);

        out.push_str("\nProcessing Audio Features\n");
        Self::write_features(&mut out, &report.training_features);
        Self::write_features(&mut out, &report.test_features);

        for result in &report.classifiers {
            out.push_str(&format!("\n{}\n", result.heading));
            for prediction in &result.predictions {
                out.push_str(&format!(
                    "{} song has been clustered into song: type {}.\n",
                    prediction.path.display(),
                    report.genre_name(&prediction.assignment)
                ));
            }
        }
        out
    }
}

impl ReportExporter for TextExporter {
    fn export(
        &self,
        report: &ClassificationReport,
        format: ReportFormat,
    ) -> Result<Vec<u8>, DomainError> {
        match format {
            ReportFormat::Text => Ok(Self::render(report).into_bytes()),
            other => Err(DomainError::validation(format!(
                "TextExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::labels::{GenreId, LabelTable};
    use crate::report::{Assignment, ClassifierResult, TrackPrediction};
    use crate::track::{TrackId, TrackRecord};
    use std::path::PathBuf;

    fn sample_report() -> ClassificationReport {
        let mut report = ClassificationReport::new(LabelTable::default());
        report.training_load.record(
            &TrackRecord::labeled("rock5.mp3", "Rock"),
            LoadOutcome::Loaded {
                samples: 100,
                sample_rate: 22_050,
                duration_secs: 0.1,
            },
        );
        report.test_load.record(
            &TrackRecord::unlabeled("broken.mp3"),
            LoadOutcome::Failed {
                reason: "no default track".into(),
            },
        );
        report.training_features.push(TrackFeatures {
            id: TrackId(0),
            path: PathBuf::from("rock5.mp3"),
            features: FeatureVector::from([1.0, 120.0, 0.4, 3.0, 21.0, 0.01]),
        });
        report.classifiers.push(ClassifierResult {
            name: "kmeans".into(),
            heading: "KMEANS CLUSTERING".into(),
            predictions: vec![
                TrackPrediction {
                    id: TrackId(0),
                    path: PathBuf::from("techLuke.mp3"),
                    assignment: Assignment::Cluster {
                        index: 0,
                        genre: Some(GenreId(1)),
                    },
                    expected: None,
                },
                TrackPrediction {
                    id: TrackId(1),
                    path: PathBuf::from("orchestral.mp3"),
                    assignment: Assignment::Cluster {
                        index: 1,
                        genre: None,
                    },
                    expected: None,
                },
            ],
        });
        report
    }

    #[test]
    fn text_export_lists_loads_and_predictions() {
        let bytes = TextExporter
            .export(&sample_report(), ReportFormat::Text)
            .unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("Audio rock5.mp3 Waveform Loaded"));
        assert!(output.contains("Failed to load audio broken.mp3: no default track"));
        assert!(output.contains("rock5.mp3 mfcc=1.000000"));
        assert!(output.contains("\nKMEANS CLUSTERING\n"));
        assert!(output.contains("techLuke.mp3 song has been clustered into song: type Techno."));
        assert!(
            output.contains("orchestral.mp3 song has been clustered into song: type cluster 1.")
        );
    }

    #[test]
    fn text_render_keeps_line_order() {
        let output = TextExporter::render(&sample_report());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Audio rock5.mp3 Waveform Loaded");
        assert_eq!(lines[1], "Failed to load audio broken.mp3: no default track");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "Processing Audio Features");
        assert!(lines[4].starts_with("rock5.mp3 mfcc="));
        assert_eq!(&lines[5..7], &["", "KMEANS CLUSTERING"]);
        assert_eq!(lines.len(), 9);
        assert!(output.ends_with("type cluster 1.\n"));
    }

    #[test]
    fn exports_json() {
        let bytes = JsonExporter
            .export(&sample_report(), ReportFormat::Json)
            .unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"heading\": \"KMEANS CLUSTERING\""));
        assert!(output.contains("\"status\": \"failed\""));
        let parsed: ClassificationReport = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.classifiers[0].predictions.len(), 2);
    }

    #[test]
    fn exporters_reject_other_formats() {
        assert!(JsonExporter
            .export(&sample_report(), ReportFormat::Text)
            .is_err());
        assert!(TextExporter
            .export(&sample_report(), ReportFormat::Json)
            .is_err());
    }
}
