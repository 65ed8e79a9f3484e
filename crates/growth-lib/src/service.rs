//! Predictor service: owns the active artifact bundle and its lifecycle
//!
//! The service is constructed explicitly and moves through
//! `Uninitialized -> Loading | Training -> Ready`, or into `Failed` when no
//! usable model can be produced. The active bundle lives behind
//! `RwLock<Option<Arc<ArtifactBundle>>>`: readers clone the `Arc` and drop
//! the lock before running inference, and a retrain publishes its new
//! bundle with a single swap.

use crate::dataset::DatasetSource;
use crate::error::{GrowthError, InputField, Result};
use crate::models::{BatchFailure, BatchOutcome, PredictionRequest, PredictionResult, TrainingMetrics};
use crate::observability::{PredictorMetrics, StructuredLogger};
use crate::predictor::{
    ArtifactBundle, Classifier, FeatureCodec, OutputFormatter, SexCodec, TrainedModel, Trainer,
    TrainerConfig,
};
use crate::store::{ArtifactStore, CacheLookup, CacheMiss, CacheStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::debug;

/// Lifecycle state of a `PredictorService`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Loading,
    Training,
    Ready,
    /// Terminal until `shutdown`; the cause is kept in the status
    Failed,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Loading => "loading",
            ServiceState::Training => "training",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
        }
    }

    /// Numeric value exported by the state gauge
    pub fn code(&self) -> i64 {
        match self {
            ServiceState::Uninitialized => 0,
            ServiceState::Loading => 1,
            ServiceState::Training => 2,
            ServiceState::Ready => 3,
            ServiceState::Failed => 4,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the active bundle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Cache,
    Training,
}

/// Descriptive view of the active model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub algorithm: String,
    pub n_features: usize,
    pub n_classes: usize,
    pub classes: Vec<String>,
    pub sex_mapping: BTreeMap<String, u8>,
    pub created_at: DateTime<Utc>,
    pub source: ModelSource,
    pub probability: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingMetrics>,
}

impl ModelInfo {
    pub fn from_bundle(bundle: &ArtifactBundle, source: ModelSource) -> Self {
        let meta = &bundle.metadata;
        Self {
            algorithm: meta.algorithm.clone(),
            n_features: meta.n_features,
            n_classes: meta.n_classes,
            classes: meta.classes.clone(),
            sex_mapping: meta.sex_mapping.clone(),
            created_at: meta.created_at,
            source,
            probability: bundle.classifier.has_probability(),
            training: meta.training.clone(),
        }
    }
}

/// Number of state changes kept for diagnostics
const TRANSITION_HISTORY: usize = 32;

/// One recorded lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: ServiceState,
    pub to: ServiceState,
    pub at: DateTime<Utc>,
}

/// Read-only snapshot of the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub ready: bool,
    /// Cause recorded when the service entered `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Most recent best-effort save failure, cleared by the next successful save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_save_error: Option<String>,
    pub cache: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    /// Most recent transitions, oldest first
    #[serde(default)]
    pub transitions: Vec<StateChange>,
}

/// Predictor configuration
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Directory holding the cached artifact bundle
    pub cache_dir: PathBuf,
    /// When false the cache is neither read nor written
    pub auto_cache: bool,
    pub sex: SexCodec,
    /// Accepted ages in months, inclusive
    pub age_range: RangeInclusive<i64>,
    /// Accepted heights in centimetres, inclusive
    pub height_range: RangeInclusive<f64>,
    pub trainer: TrainerConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("model_cache"),
            auto_cache: true,
            sex: SexCodec::default(),
            age_range: 0..=60,
            height_range: 30.0..=200.0,
            trainer: TrainerConfig::default(),
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: ServiceState,
    failure: Option<String>,
    source: Option<ModelSource>,
    last_save_error: Option<String>,
    history: VecDeque<StateChange>,
}

/// Owns the active artifact bundle and serves predictions from it
pub struct PredictorService {
    config: PredictorConfig,
    store: ArtifactStore,
    trainer: Trainer,
    lifecycle: RwLock<Lifecycle>,
    /// Serializes initialize, retrain and shutdown
    transitions: Mutex<()>,
    active: RwLock<Option<Arc<ArtifactBundle>>>,
    metrics: PredictorMetrics,
    logger: StructuredLogger,
}

impl PredictorService {
    pub fn new(config: PredictorConfig) -> Self {
        let store = ArtifactStore::new(config.cache_dir.clone()).with_enabled(config.auto_cache);
        let trainer = Trainer::new(config.trainer.clone(), config.sex.clone());
        let logger = StructuredLogger::new(config.cache_dir.display().to_string());
        let metrics = PredictorMetrics::new();
        metrics.set_state(ServiceState::Uninitialized);

        Self {
            config,
            store,
            trainer,
            lifecycle: RwLock::new(Lifecycle {
                state: ServiceState::Uninitialized,
                failure: None,
                source: None,
                last_save_error: None,
                history: VecDeque::with_capacity(TRANSITION_HISTORY),
            }),
            transitions: Mutex::new(()),
            active: RwLock::new(None),
            metrics,
            logger,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle_read().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// Brings the service to `Ready` from the cache or by training
    ///
    /// No-op when already `Ready` or `Failed`. Returns the resulting state;
    /// on failure the cause is available from `status()`.
    pub fn initialize(&self, source: &dyn DatasetSource) -> ServiceState {
        let _guard = self.transitions.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.state();
        if matches!(current, ServiceState::Ready | ServiceState::Failed) {
            debug!(state = %current, "Initialize called on settled predictor, nothing to do");
            return current;
        }

        match self.load_cached() {
            Ok(Some(bundle)) => {
                self.logger.log_cache_hit(bundle.encoder.classes());
                self.activate(bundle, ModelSource::Cache);
                return ServiceState::Ready;
            }
            Ok(None) => {}
            Err(e) => return self.fail(e),
        }

        self.set_state(ServiceState::Training);
        match self.train(source) {
            Ok(model) => {
                let bundle = self.persist(model.bundle);
                self.activate(bundle, ModelSource::Training);
                ServiceState::Ready
            }
            Err(e) => self.fail(e),
        }
    }

    /// Classifies one child
    pub fn predict(&self, age_months: i64, sex: &str, height_cm: f64) -> Result<PredictionResult> {
        self.predict_request(&PredictionRequest::new(age_months, sex, height_cm))
    }

    pub fn predict_request(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        let bundle = match self.snapshot() {
            Ok(bundle) => bundle,
            Err(e) => {
                self.metrics.inc_prediction(e.kind());
                return Err(e);
            }
        };
        self.predict_with(&bundle, request)
    }

    /// Classifies every request against one bundle snapshot
    ///
    /// Fails as a whole only when the service is not ready; otherwise each
    /// position carries its own success or failure.
    pub fn batch_predict(&self, requests: &[PredictionRequest]) -> Result<Vec<BatchOutcome>> {
        let bundle = self.snapshot()?;
        Ok(requests
            .iter()
            .map(|request| {
                self.predict_with(&bundle, request).map_err(|error| BatchFailure {
                    input: request.clone(),
                    error,
                })
            })
            .collect())
    }

    /// Trains a new bundle and swaps it in; the previous one keeps serving on error
    pub fn retrain(&self, source: &dyn DatasetSource) -> Result<TrainingMetrics> {
        let _guard = self.transitions.lock().unwrap_or_else(PoisonError::into_inner);

        let state = self.state();
        if state != ServiceState::Ready {
            return Err(GrowthError::NotReady { state });
        }

        let model = match self.train(source) {
            Ok(model) => model,
            Err(e) => {
                self.logger.log_retrain(false, &e.to_string());
                return Err(e);
            }
        };

        let metrics = model.metrics.clone();
        let bundle = self.persist(model.bundle);
        self.activate(bundle, ModelSource::Training);
        self.logger.log_retrain(
            true,
            &format!("train_accuracy={:.4} samples={}", metrics.train_accuracy, metrics.n_samples),
        );
        Ok(metrics)
    }

    /// Drops the active bundle and returns to `Uninitialized`
    pub fn shutdown(&self) {
        let _guard = self.transitions.lock().unwrap_or_else(PoisonError::into_inner);
        *self.active_write() = None;
        {
            let mut lifecycle = self.lifecycle_write();
            lifecycle.failure = None;
            lifecycle.source = None;
        }
        self.set_state(ServiceState::Uninitialized);
        self.metrics.clear_model_info();
        self.logger.log_shutdown();
    }

    pub fn status(&self) -> ServiceStatus {
        let (state, failure, last_save_error, transitions) = {
            let lifecycle = self.lifecycle_read();
            (
                lifecycle.state,
                lifecycle.failure.clone(),
                lifecycle.last_save_error.clone(),
                lifecycle.history.iter().copied().collect(),
            )
        };
        ServiceStatus {
            state,
            ready: state == ServiceState::Ready,
            failure,
            last_save_error,
            cache: self.store.status(),
            model: self.model_info(),
            transitions,
        }
    }

    /// Describes the active bundle, if any
    pub fn model_info(&self) -> Option<ModelInfo> {
        let bundle = self.active_read().clone()?;
        let source = self.lifecycle_read().source?;
        Some(ModelInfo::from_bundle(&bundle, source))
    }

    /// Looks up the cache; `Ok(None)` means train instead
    fn load_cached(&self) -> Result<Option<ArtifactBundle>> {
        if !self.store.is_enabled() {
            self.record_miss(CacheMiss::Disabled);
            return Ok(None);
        }

        let files = self.store.status().files;
        if !files.all_present() {
            // Nothing to load, go straight to training
            let missing = crate::store::ArtifactKind::ALL
                .into_iter()
                .filter(|k| !self.store.path_of(*k).exists())
                .collect();
            self.record_miss(CacheMiss::Missing(missing));
            return Ok(None);
        }

        self.set_state(ServiceState::Loading);
        let bundle = match self.store.load() {
            Ok(CacheLookup::Hit(bundle)) => *bundle,
            Ok(CacheLookup::Miss(reason)) => {
                self.record_miss(reason);
                return Ok(None);
            }
            Err(e) => {
                self.metrics.inc_cache_lookup("corrupt");
                return Err(e);
            }
        };

        if bundle.metadata.sex_mapping != self.config.sex.mapping() {
            self.record_miss(CacheMiss::SexMappingChanged);
            return Ok(None);
        }

        self.metrics.inc_cache_lookup("hit");
        Ok(Some(bundle))
    }

    fn record_miss(&self, reason: CacheMiss) {
        let label = if reason == CacheMiss::Disabled {
            "disabled"
        } else {
            "miss"
        };
        self.metrics.inc_cache_lookup(label);
        self.logger.log_cache_miss(&reason.to_string());
    }

    fn train(&self, source: &dyn DatasetSource) -> Result<TrainedModel> {
        let dataset = source.load()?;
        let model = self.trainer.train(&dataset)?;
        self.metrics
            .observe_training_duration(model.metrics.duration_ms as f64 / 1000.0);
        self.logger
            .log_training_completed(&source.describe(), &model.metrics);
        Ok(model)
    }

    /// Best-effort save; the returned bundle carries the stored checksums on success
    fn persist(&self, mut bundle: ArtifactBundle) -> ArtifactBundle {
        if !self.store.is_enabled() {
            return bundle;
        }
        let outcome = self.store.save(&bundle);
        let mut lifecycle = self.lifecycle_write();
        match outcome {
            Ok(metadata) => {
                bundle.metadata = metadata;
                lifecycle.last_save_error = None;
            }
            Err(e) => {
                self.metrics.inc_cache_save_failures();
                self.logger.log_save_failed(&e.to_string());
                lifecycle.last_save_error = Some(e.to_string());
            }
        }
        bundle
    }

    fn activate(&self, bundle: ArtifactBundle, source: ModelSource) {
        self.metrics
            .set_model_info(&bundle.metadata.algorithm, bundle.encoder.classes());
        *self.active_write() = Some(Arc::new(bundle));
        {
            let mut lifecycle = self.lifecycle_write();
            lifecycle.source = Some(source);
            lifecycle.failure = None;
        }
        self.set_state(ServiceState::Ready);
    }

    fn fail(&self, error: GrowthError) -> ServiceState {
        self.logger.log_initialize_failed(error.kind(), &error.to_string());
        *self.active_write() = None;
        self.lifecycle_write().failure = Some(error.to_string());
        self.set_state(ServiceState::Failed);
        ServiceState::Failed
    }

    fn set_state(&self, next: ServiceState) {
        let previous = {
            let mut lifecycle = self.lifecycle_write();
            let previous = std::mem::replace(&mut lifecycle.state, next);
            if previous != next {
                if lifecycle.history.len() == TRANSITION_HISTORY {
                    lifecycle.history.pop_front();
                }
                lifecycle.history.push_back(StateChange {
                    from: previous,
                    to: next,
                    at: Utc::now(),
                });
            }
            previous
        };
        if previous != next {
            self.metrics.set_state(next);
            self.logger.log_state_change(previous, next);
        }
    }

    /// Active bundle, or `NotReady` carrying the current state
    fn snapshot(&self) -> Result<Arc<ArtifactBundle>> {
        let state = self.state();
        if state != ServiceState::Ready {
            return Err(GrowthError::NotReady { state });
        }
        self.active_read()
            .clone()
            .ok_or(GrowthError::NotReady { state })
    }

    fn predict_with(
        &self,
        bundle: &ArtifactBundle,
        request: &PredictionRequest,
    ) -> Result<PredictionResult> {
        let start = Instant::now();
        let result = self.classify(bundle, request);
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => self.metrics.inc_prediction("ok"),
            Err(e) => self.metrics.inc_prediction(e.kind()),
        }
        result
    }

    fn classify(&self, bundle: &ArtifactBundle, request: &PredictionRequest) -> Result<PredictionResult> {
        self.validate(request)?;

        let codec = FeatureCodec::new(&self.config.sex, &bundle.scaler);
        let features = codec.encode(request.age_months, &request.sex, request.height_cm)?;

        let code = bundle.classifier.predict(&features)?;
        let probabilities = bundle.classifier.predict_proba(&features).transpose()?;

        OutputFormatter::new(bundle).format(code, probabilities.as_deref(), request)
    }

    /// Checks age then height; sex is checked by the codec
    fn validate(&self, request: &PredictionRequest) -> Result<()> {
        let ages = &self.config.age_range;
        if !ages.contains(&request.age_months) {
            return Err(GrowthError::invalid_input(
                InputField::Age,
                format!(
                    "must be between {} and {} months, got {}",
                    ages.start(),
                    ages.end(),
                    request.age_months
                ),
            ));
        }

        let heights = &self.config.height_range;
        if !request.height_cm.is_finite() || !heights.contains(&request.height_cm) {
            return Err(GrowthError::invalid_input(
                InputField::Height,
                format!(
                    "must be between {} and {} cm, got {}",
                    heights.start(),
                    heights.end(),
                    request.height_cm
                ),
            ));
        }
        Ok(())
    }

    fn lifecycle_read(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.lifecycle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lifecycle_write(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.lifecycle.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_read(&self) -> RwLockReadGuard<'_, Option<Arc<ArtifactBundle>>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_write(&self) -> RwLockWriteGuard<'_, Option<Arc<ArtifactBundle>>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }
}
