//! Core data models for the growth classifier

use crate::error::GrowthError;
use serde::{Deserialize, Serialize};

/// Number of features fed to the classifier: age, encoded sex, height
pub const NUM_FEATURES: usize = 3;

/// One labeled training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub age_months: i64,
    pub sex: String,
    pub height_cm: f64,
    pub label: String,
}

/// Numeric encoding of one example: [age, encoded sex, height]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; NUM_FEATURES]);

impl FeatureVector {
    pub fn new(age_months: f64, sex_code: f64, height_cm: f64) -> Self {
        Self([age_months, sex_code, height_cm])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Input for a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(alias = "umur")]
    pub age_months: i64,
    #[serde(alias = "jenis_kelamin")]
    pub sex: String,
    #[serde(alias = "tinggi_badan")]
    pub height_cm: f64,
}

impl PredictionRequest {
    pub fn new(age_months: i64, sex: impl Into<String>, height_cm: f64) -> Self {
        Self {
            age_months,
            sex: sex.into(),
            height_cm,
        }
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Title-cased class label
    pub label: String,
    /// Label exactly as seen in the training data
    pub raw_label: String,
    pub class_code: usize,
    /// Probability of the winning class, absent when the classifier has no estimates
    pub confidence: Option<f64>,
    pub classes: Vec<String>,
    pub algorithm: String,
    pub input: PredictionRequest,
}

/// Per-item failure inside a batch
#[derive(Debug)]
pub struct BatchFailure {
    pub input: PredictionRequest,
    pub error: GrowthError,
}

/// One entry of a batch result, aligned with the input position
pub type BatchOutcome = std::result::Result<PredictionResult, BatchFailure>;

/// Evaluation metrics produced by a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_accuracy: f64,
    /// Absent when the run used no held-out split
    pub test_accuracy: Option<f64>,
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub duration_ms: u64,
}
