//! Model training
//!
//! Splits a labeled dataset into stratified train/test partitions, fits the
//! label encoder and scaler on the train split only, then fits the
//! classifier on the scaled train features.

use super::{
    ArtifactBundle, CacheMetadata, Classifier, LabelEncoder, LinearSvm, SexCodec, StandardScaler,
    SvmParams, CACHE_FORMAT_VERSION,
};
use crate::dataset::Dataset;
use crate::error::{GrowthError, Result};
use crate::models::{FeatureVector, TrainingMetrics, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Fraction of each class held out for evaluation, in [0, 1)
    pub test_fraction: f64,
    /// Seed for the stratified shuffle
    pub seed: u64,
    pub svm: SvmParams,
    /// Fit probability estimates so predictions carry a confidence
    pub probability: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            svm: SvmParams::default(),
            probability: false,
        }
    }
}

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub bundle: ArtifactBundle,
    pub metrics: TrainingMetrics,
}

/// Fits an artifact bundle from a dataset
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
    sex: SexCodec,
}

impl Trainer {
    pub fn new(config: TrainerConfig, sex: SexCodec) -> Self {
        Self { config, sex }
    }

    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModel> {
        let start = Instant::now();
        let fraction = self.config.test_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(GrowthError::dataset(format!(
                "test fraction must be in [0, 1), got {fraction}"
            )));
        }

        let features = self.encode_rows(dataset)?;
        let labels: Vec<&str> = dataset.rows().iter().map(|r| r.label.trim()).collect();

        let distinct = dataset.distinct_labels();
        if distinct.len() < 2 {
            return Err(GrowthError::dataset(format!(
                "need at least 2 distinct labels, found {}",
                distinct.len()
            )));
        }

        let (train_idx, test_idx) = stratified_split(&labels, fraction, self.config.seed)?;
        debug!(
            train = train_idx.len(),
            test = test_idx.len(),
            seed = self.config.seed,
            "Stratified split"
        );

        let train_x: Vec<FeatureVector> = train_idx.iter().map(|&i| features[i]).collect();
        let test_x: Vec<FeatureVector> = test_idx.iter().map(|&i| features[i]).collect();

        let encoder = LabelEncoder::fit(train_idx.iter().map(|&i| labels[i]));
        let train_y = encoder.encode_all(train_idx.iter().map(|&i| labels[i]))?;
        let test_y = encoder.encode_all(test_idx.iter().map(|&i| labels[i]))?;

        let scaler = StandardScaler::fit(&train_x)?;
        let train_scaled = scaler.transform_all(&train_x);
        let test_scaled = scaler.transform_all(&test_x);

        let classifier = LinearSvm::fit(
            &train_scaled,
            &train_y,
            encoder.len(),
            self.config.svm,
            self.config.probability,
        )?;

        let train_accuracy = classifier.score(&train_scaled, &train_y)?;
        let test_accuracy = if test_scaled.is_empty() {
            None
        } else {
            Some(classifier.score(&test_scaled, &test_y)?)
        };

        let metrics = TrainingMetrics {
            train_accuracy,
            test_accuracy,
            n_samples: dataset.len(),
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            n_features: NUM_FEATURES,
            n_classes: encoder.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            samples = metrics.n_samples,
            classes = metrics.n_classes,
            train_accuracy = metrics.train_accuracy,
            test_accuracy = ?metrics.test_accuracy,
            duration_ms = metrics.duration_ms,
            "Training completed"
        );

        let metadata = CacheMetadata {
            format_version: CACHE_FORMAT_VERSION,
            algorithm: classifier.algorithm().to_string(),
            n_features: NUM_FEATURES,
            n_classes: encoder.len(),
            classes: encoder.classes().to_vec(),
            sex_mapping: self.sex.mapping(),
            created_at: chrono::Utc::now(),
            training: Some(metrics.clone()),
            checksums: BTreeMap::new(),
        };

        Ok(TrainedModel {
            bundle: ArtifactBundle {
                classifier,
                scaler,
                encoder,
                metadata,
            },
            metrics,
        })
    }

    /// Validates every row and builds its unscaled feature vector
    fn encode_rows(&self, dataset: &Dataset) -> Result<Vec<FeatureVector>> {
        if dataset.is_empty() {
            return Err(GrowthError::dataset("dataset is empty"));
        }

        dataset
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let n = i + 1;
                if row.label.trim().is_empty() {
                    return Err(GrowthError::dataset(format!("row {n}: missing outcome label")));
                }
                if row.age_months < 0 {
                    return Err(GrowthError::dataset(format!(
                        "row {n}: negative age {}",
                        row.age_months
                    )));
                }
                if !row.height_cm.is_finite() {
                    return Err(GrowthError::dataset(format!("row {n}: height is not a finite number")));
                }
                let sex = self.sex.encode(&row.sex).map_err(|_| {
                    GrowthError::dataset(format!("row {n}: unmappable sex value '{}'", row.sex))
                })?;
                Ok(FeatureVector::new(
                    row.age_months as f64,
                    f64::from(sex),
                    row.height_cm,
                ))
            })
            .collect()
    }
}

/// Deterministic train/test split preserving each label's proportion
///
/// Returns sorted (train, test) row indices.
pub(crate) fn stratified_split(
    labels: &[&str],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, indices) in groups.iter_mut() {
        if test_fraction > 0.0 && indices.len() < 2 {
            return Err(GrowthError::dataset(format!(
                "label '{label}' has only {} row; every class needs at least 2 for a stratified split",
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_fraction).round() as usize).min(indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{growth_dataset, row};

    fn trainer() -> Trainer {
        Trainer::new(TrainerConfig::default(), SexCodec::default())
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let labels: Vec<&str> = (0..100).map(|i| if i < 80 { "a" } else { "b" }).collect();
        let (train, test) = stratified_split(&labels, 0.25, 7).unwrap();
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.iter().filter(|&&i| labels[i] == "a").count(), 20);
        assert_eq!(test.iter().filter(|&&i| labels[i] == "b").count(), 5);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let labels: Vec<&str> = (0..50).map(|i| ["x", "y", "z"][i % 3]).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 42).unwrap()
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn test_stratified_split_rejects_singleton_class() {
        let labels = vec!["a", "a", "a", "b"];
        assert!(stratified_split(&labels, 0.2, 1).is_err());
        let (train, test) = stratified_split(&labels, 0.0, 1).unwrap();
        assert_eq!(train.len(), 4);
        assert!(test.is_empty());
    }

    #[test]
    fn test_train_produces_consistent_bundle() {
        let model = trainer().train(&growth_dataset()).unwrap();
        let bundle = &model.bundle;
        assert!(bundle.inconsistency().is_none());
        assert_eq!(bundle.encoder.classes(), &["Normal", "Stunted"]);
        assert_eq!(model.metrics.n_features, 3);
        assert_eq!(model.metrics.n_classes, 2);
        assert_eq!(model.metrics.n_train + model.metrics.n_test, model.metrics.n_samples);
        assert!(model.metrics.train_accuracy > 0.95);
        assert!(model.metrics.test_accuracy.unwrap() > 0.9);
        assert_eq!(bundle.metadata.algorithm, "SVM (Linear Kernel)");
    }

    #[test]
    fn test_train_is_deterministic() {
        let a = trainer().train(&growth_dataset()).unwrap();
        let b = trainer().train(&growth_dataset()).unwrap();
        assert_eq!(a.bundle.classifier, b.bundle.classifier);
        assert_eq!(a.bundle.scaler, b.bundle.scaler);
        assert_eq!(a.bundle.encoder, b.bundle.encoder);
    }

    #[test]
    fn test_train_rejects_invalid_datasets() {
        let err = trainer().train(&Dataset::default()).unwrap_err();
        assert!(matches!(err, GrowthError::DatasetInvalid(_)));

        // Padding does not make a second class
        let single_class = Dataset::new(vec![
            row(10, "Laki-laki", 70.0, "Normal"),
            row(12, "Perempuan", 72.0, " Normal "),
        ]);
        assert!(matches!(
            trainer().train(&single_class).unwrap_err(),
            GrowthError::DatasetInvalid(_)
        ));

        let mut rows = growth_dataset().rows().to_vec();
        rows[3].sex = "unknown".to_string();
        let err = trainer().train(&Dataset::new(rows)).unwrap_err();
        assert!(err.to_string().contains("row 4"));

        let mut rows = growth_dataset().rows().to_vec();
        rows[0].label = "  ".to_string();
        assert!(matches!(
            trainer().train(&Dataset::new(rows)).unwrap_err(),
            GrowthError::DatasetInvalid(_)
        ));
    }

    #[test]
    fn test_train_rejects_bad_test_fraction() {
        let config = TrainerConfig {
            test_fraction: 1.0,
            ..Default::default()
        };
        let err = Trainer::new(config, SexCodec::default())
            .train(&growth_dataset())
            .unwrap_err();
        assert!(matches!(err, GrowthError::DatasetInvalid(_)));
    }

    #[test]
    fn test_train_without_holdout() {
        let config = TrainerConfig {
            test_fraction: 0.0,
            ..Default::default()
        };
        let model = Trainer::new(config, SexCodec::default())
            .train(&growth_dataset())
            .unwrap();
        assert_eq!(model.metrics.n_test, 0);
        assert!(model.metrics.test_accuracy.is_none());
    }
}
