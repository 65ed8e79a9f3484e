//! ML prediction engine

mod bundle;
mod features;
mod output;
mod svm;
mod trainer;

pub use bundle::{ArtifactBundle, CacheMetadata, CACHE_FORMAT_VERSION};
pub use features::{FeatureCodec, LabelEncoder, SexCodec, StandardScaler};
pub use output::{title_case, OutputFormatter};
pub use svm::{LinearSvm, SvmParams, ALGORITHM};
pub use trainer::{TrainedModel, Trainer, TrainerConfig};

use crate::error::Result;

/// Trait for classifier implementations
pub trait Classifier: Send + Sync {
    /// Human-readable algorithm identifier
    fn algorithm(&self) -> &str;

    /// Number of input features expected
    fn n_features(&self) -> usize;

    /// Number of output classes
    fn n_classes(&self) -> usize;

    /// Predict the class code for one scaled feature vector
    fn predict(&self, features: &[f64]) -> Result<usize>;

    /// Class probabilities, or `None` when the classifier has no estimates
    fn predict_proba(&self, _features: &[f64]) -> Option<Result<Vec<f64>>> {
        None
    }
}
