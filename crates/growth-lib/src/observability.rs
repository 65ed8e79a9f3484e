//! Observability infrastructure for the growth predictor
//!
//! Provides:
//! - Prometheus metrics (prediction outcomes and latency, training duration, cache lookups)
//! - Structured JSON logging of lifecycle events with tracing

use crate::models::TrainingMetrics;
use crate::service::ServiceState;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for single predictions (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Histogram buckets for training runs (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    predictions_total: IntCounterVec,
    prediction_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    cache_lookups_total: IntCounterVec,
    cache_save_failures_total: IntCounter,
    state: IntGauge,
    model_info: IntGaugeVec,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            predictions_total: register_int_counter_vec!(
                "growth_predictor_predictions_total",
                "Predictions served, by outcome (ok or the error kind)",
                &["outcome"]
            )
            .expect("Failed to register predictions_total"),

            prediction_latency_seconds: register_histogram!(
                "growth_predictor_prediction_latency_seconds",
                "Time spent validating, encoding and classifying one request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            training_duration_seconds: register_histogram!(
                "growth_predictor_training_duration_seconds",
                "Wall time of training runs",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            cache_lookups_total: register_int_counter_vec!(
                "growth_predictor_cache_lookups_total",
                "Artifact cache lookups, by result (hit, miss, corrupt, disabled)",
                &["result"]
            )
            .expect("Failed to register cache_lookups_total"),

            cache_save_failures_total: register_int_counter!(
                "growth_predictor_cache_save_failures_total",
                "Artifact bundle saves that failed"
            )
            .expect("Failed to register cache_save_failures_total"),

            state: register_int_gauge!(
                "growth_predictor_state",
                "Lifecycle state: 0 uninitialized, 1 loading, 2 training, 3 ready, 4 failed"
            )
            .expect("Failed to register state"),

            model_info: register_int_gauge_vec!(
                "growth_predictor_model_info",
                "Information about the active artifact bundle",
                &["algorithm", "classes"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Predictor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    /// Count one prediction; `outcome` is "ok" or a `GrowthError::kind()`
    pub fn inc_prediction(&self, outcome: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cache_lookup(&self, result: &str) {
        self.inner()
            .cache_lookups_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn inc_cache_save_failures(&self) {
        self.inner().cache_save_failures_total.inc();
    }

    pub fn set_state(&self, state: ServiceState) {
        self.inner().state.set(state.code());
    }

    /// Replace the active model labels
    pub fn set_model_info(&self, algorithm: &str, classes: &[String]) {
        let inner = self.inner();
        let classes = classes.join(",");
        inner.model_info.reset();
        inner
            .model_info
            .with_label_values(&[algorithm, classes.as_str()])
            .set(1);
    }

    pub fn clear_model_info(&self) {
        self.inner().model_info.reset();
    }
}

/// Structured logger for lifecycle events
///
/// Every record carries an `event` field and the cache directory so log
/// pipelines can follow one service instance across restarts.
#[derive(Clone)]
pub struct StructuredLogger {
    cache_dir: String,
}

impl StructuredLogger {
    pub fn new(cache_dir: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn log_state_change(&self, from: ServiceState, to: ServiceState) {
        info!(
            event = "state_changed",
            cache_dir = %self.cache_dir,
            from = %from,
            to = %to,
            "Predictor state changed"
        );
    }

    pub fn log_cache_hit(&self, classes: &[String]) {
        info!(
            event = "cache_hit",
            cache_dir = %self.cache_dir,
            classes = ?classes,
            "Loaded artifact bundle from cache"
        );
    }

    pub fn log_cache_miss(&self, reason: &str) {
        info!(
            event = "cache_miss",
            cache_dir = %self.cache_dir,
            reason = %reason,
            "No usable cached bundle, training from dataset"
        );
    }

    pub fn log_training_completed(&self, source: &str, metrics: &TrainingMetrics) {
        info!(
            event = "training_completed",
            cache_dir = %self.cache_dir,
            source = %source,
            samples = metrics.n_samples,
            classes = metrics.n_classes,
            train_accuracy = metrics.train_accuracy,
            test_accuracy = ?metrics.test_accuracy,
            duration_ms = metrics.duration_ms,
            "Model trained"
        );
    }

    pub fn log_save_failed(&self, reason: &str) {
        warn!(
            event = "cache_save_failed",
            cache_dir = %self.cache_dir,
            reason = %reason,
            "Failed to persist artifact bundle, serving from memory"
        );
    }

    pub fn log_initialize_failed(&self, kind: &str, reason: &str) {
        error!(
            event = "initialize_failed",
            cache_dir = %self.cache_dir,
            kind = %kind,
            reason = %reason,
            "Predictor initialization failed"
        );
    }

    pub fn log_retrain(&self, success: bool, detail: &str) {
        if success {
            info!(
                event = "model_retrained",
                cache_dir = %self.cache_dir,
                detail = %detail,
                "Active model replaced"
            );
        } else {
            warn!(
                event = "model_retrain_failed",
                cache_dir = %self.cache_dir,
                detail = %detail,
                "Retrain failed, keeping previous model"
            );
        }
    }

    pub fn log_shutdown(&self) {
        info!(
            event = "predictor_shutdown",
            cache_dir = %self.cache_dir,
            "Predictor shut down"
        );
    }
}
