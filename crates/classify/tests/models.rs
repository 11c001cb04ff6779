use std::collections::HashSet;

use cadence_classify::{ClassifierConfig, ClassifyError, TrainingSet};
use cadence_domain::{Assignment, FeatureVector, GenreId};

/// Rough stand-ins for rock (slower, brighter contrast) and techno
/// (faster, denser mel energy) summaries.
fn genre_samples() -> TrainingSet {
    let rock = [
        [-12.0, 112.3, 0.41, 2.1, 21.5, 0.012],
        [-10.5, 117.5, 0.44, 2.6, 22.1, 0.018],
        [-11.2, 107.7, 0.39, 1.9, 21.0, 0.009],
        [-13.1, 123.0, 0.43, 2.4, 21.8, 0.015],
    ];
    let techno = [
        [-4.2, 129.2, 0.33, 9.8, 18.9, -0.004],
        [-3.9, 126.0, 0.31, 11.2, 18.4, -0.007],
        [-5.0, 129.2, 0.35, 10.4, 19.2, -0.002],
        [-4.6, 132.5, 0.30, 12.0, 18.1, -0.010],
    ];
    rock.iter()
        .map(|values| (FeatureVector::from(*values), GenreId(0)))
        .chain(
            techno
                .iter()
                .map(|values| (FeatureVector::from(*values), GenreId(1))),
        )
        .collect()
}

#[test]
fn every_model_assigns_each_test_vector_once() {
    let training = genre_samples();
    let tests: Vec<FeatureVector> = training
        .samples()
        .iter()
        .map(|sample| {
            let mut shifted = *sample;
            shifted.tempo += 1.0;
            shifted
        })
        .collect();
    let seen: HashSet<GenreId> = training.labels().iter().copied().collect();

    for mut model in ClassifierConfig::default().build() {
        model.fit(&training).unwrap();
        let predictions = model.predict(&tests).unwrap();
        assert_eq!(predictions.len(), tests.len(), "{}", model.name());
        for assignment in predictions {
            match assignment {
                Assignment::Genre { genre } => assert!(seen.contains(&genre)),
                Assignment::Cluster { index, genre } => {
                    assert!(index < 2);
                    if let Some(genre) = genre {
                        assert!(seen.contains(&genre));
                    }
                }
            }
        }
    }
}

#[test]
fn supervised_models_recover_training_genres() {
    let training = genre_samples();
    for mut model in ClassifierConfig::default().build() {
        model.fit(&training).unwrap();
        let predictions = model.predict(training.samples()).unwrap();
        let genres: Vec<_> = predictions.iter().map(|a| a.genre()).collect();
        let expected: Vec<_> = training.labels().iter().map(|&g| Some(g)).collect();
        assert_eq!(genres, expected, "{}", model.name());
    }
}

#[test]
fn every_model_rejects_non_finite_vectors() {
    let clean = genre_samples();
    let mut poisoned: Vec<(FeatureVector, GenreId)> =
        clean.iter().map(|(sample, label)| (*sample, label)).collect();
    poisoned[3].0.mel = f64::NAN;
    let poisoned: TrainingSet = poisoned.into_iter().collect();

    let mut tests = clean.samples().to_vec();
    tests[1].tempo = f64::INFINITY;

    for mut model in ClassifierConfig::default().build() {
        let err = model.fit(&poisoned).unwrap_err();
        assert!(
            matches!(err, ClassifyError::NonFinite { stage: "training", index: 3 }),
            "{}: {err}",
            model.name()
        );

        model.fit(&clean).unwrap();
        let err = model.predict(&tests).unwrap_err();
        assert!(
            matches!(err, ClassifyError::NonFinite { stage: "test", index: 1 }),
            "{}: {err}",
            model.name()
        );
    }
}
