//! Model lifecycle library for the child growth classifier
//!
//! This crate provides the core functionality for:
//! - Dataset loading and feature encoding
//! - Training a linear SVM with a stratified hold-out split
//! - Atomic, checksummed caching of the artifact bundle
//! - A predictor service with an explicit init/teardown lifecycle
//! - Health checks and observability

pub mod dataset;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use dataset::{CsvDatasetSource, Dataset, DatasetColumns, DatasetSource};
pub use error::{GrowthError, InputField, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PredictorMetrics, StructuredLogger};
pub use service::{
    ModelInfo, ModelSource, PredictorConfig, PredictorService, ServiceState, ServiceStatus,
    StateChange,
};
pub use store::{ArtifactKind, ArtifactStore, CacheLookup, CacheMiss, CacheStatus};
