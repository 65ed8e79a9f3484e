//! Artifact bundle: the unit of model state

use super::{Classifier, LabelEncoder, LinearSvm, StandardScaler};
use crate::models::TrainingMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the on-disk layout of any artifact changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Descriptive metadata stored next to the model artifacts
///
/// Used for status reporting and the completeness cross-check on load,
/// never as the source of truth for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub format_version: u32,
    pub algorithm: String,
    pub n_features: usize,
    pub n_classes: usize,
    pub classes: Vec<String>,
    pub sex_mapping: BTreeMap<String, u8>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub training: Option<TrainingMetrics>,
    /// SHA-256 of each persisted unit, filled in by the store on save
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Classifier, scaler, label encoder and metadata, always used together
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub classifier: LinearSvm,
    pub scaler: StandardScaler,
    pub encoder: LabelEncoder,
    pub metadata: CacheMetadata,
}

impl ArtifactBundle {
    /// Returns a description of the first disagreement between the parts
    pub fn inconsistency(&self) -> Option<String> {
        let meta = &self.metadata;
        if self.scaler.n_features() != meta.n_features {
            return Some(format!(
                "scaler has {} features, metadata says {}",
                self.scaler.n_features(),
                meta.n_features
            ));
        }
        if self.classifier.n_features() != meta.n_features {
            return Some(format!(
                "classifier has {} features, metadata says {}",
                self.classifier.n_features(),
                meta.n_features
            ));
        }
        if self.encoder.len() != meta.n_classes {
            return Some(format!(
                "encoder has {} classes, metadata says {}",
                self.encoder.len(),
                meta.n_classes
            ));
        }
        if self.classifier.n_classes() != meta.n_classes {
            return Some(format!(
                "classifier has {} classes, metadata says {}",
                self.classifier.n_classes(),
                meta.n_classes
            ));
        }
        if self.encoder.classes() != meta.classes.as_slice() {
            return Some("encoder class list differs from metadata".to_string());
        }
        None
    }
}
