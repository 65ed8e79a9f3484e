//! Error types for the growth classifier

use crate::service::ServiceState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Prediction request field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Age,
    Sex,
    Height,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputField::Age => "age",
            InputField::Sex => "sex",
            InputField::Height => "height",
        };
        f.write_str(name)
    }
}

/// Errors raised by the model lifecycle manager
#[derive(Debug, Error)]
pub enum GrowthError {
    /// Training data is empty, malformed, or cannot be labeled
    #[error("dataset invalid: {0}")]
    DatasetInvalid(String),

    /// A single prediction request failed validation
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: InputField, reason: String },

    /// Prediction attempted while the service is not Ready
    #[error("predictor is not ready (state: {state})")]
    NotReady { state: ServiceState },

    /// Unexpected failure inside the classifier
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// A cached artifact passed the completeness check but cannot be decoded
    #[error("artifact cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GrowthError {
    pub fn invalid_input(field: InputField, reason: impl Into<String>) -> Self {
        GrowthError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn dataset(reason: impl Into<String>) -> Self {
        GrowthError::DatasetInvalid(reason.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GrowthError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable snake_case name used for metric labels and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            GrowthError::DatasetInvalid(_) => "dataset_invalid",
            GrowthError::InvalidInput { .. } => "invalid_input",
            GrowthError::NotReady { .. } => "not_ready",
            GrowthError::InferenceFailure(_) => "inference_failure",
            GrowthError::CacheCorrupt(_) => "cache_corrupt",
            GrowthError::Io { .. } => "io",
        }
    }

    /// Field named by an `InvalidInput` error
    pub fn field(&self) -> Option<InputField> {
        match self {
            GrowthError::InvalidInput { field, .. } => Some(*field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GrowthError>;
