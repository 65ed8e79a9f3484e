//! Health check infrastructure for the growth predictor
//!
//! Component health is derived from `ServiceStatus` snapshots rather than
//! set by hand: the host calls `observe` after initialization and before
//! answering each health request, and liveness/readiness follow from the last
//! observed predictor state.

use crate::service::{ServiceState, ServiceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Predictor health: only `Ready` is healthy, `Failed` carries its cause
    pub fn for_predictor(status: &ServiceStatus) -> Self {
        match status.state {
            ServiceState::Ready => Self::new(ComponentStatus::Healthy, None),
            ServiceState::Failed => Self::new(
                ComponentStatus::Unhealthy,
                Some(
                    status
                        .failure
                        .clone()
                        .unwrap_or_else(|| "initialization failed".to_string()),
                ),
            ),
            other => Self::new(
                ComponentStatus::Degraded,
                Some(format!("predictor is {}", other)),
            ),
        }
    }

    /// Cache health; a broken cache never makes the process unhealthy
    pub fn for_cache(status: &ServiceStatus) -> Self {
        let message = if !status.cache.enabled {
            Some("artifact cache disabled".to_string())
        } else if let Some(err) = &status.last_save_error {
            Some(format!("last save failed: {}", err))
        } else if status.ready && !status.cache.complete {
            Some("cache incomplete, next start will retrain".to_string())
        } else {
            None
        };
        match message {
            Some(message) => Self::new(ComponentStatus::Degraded, Some(message)),
            None => Self::new(ComponentStatus::Healthy, None),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictor_state: Option<ServiceState>,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components; healthy when none are known
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const PREDICTOR: &str = "predictor";
    pub const CACHE: &str = "artifact_cache";
}

#[derive(Debug, Default)]
struct Observed {
    components: HashMap<String, ComponentHealth>,
    state: Option<ServiceState>,
    failure: Option<String>,
    draining: bool,
}

/// Health registry fed from predictor status snapshots
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<Observed>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror a predictor status snapshot into component health
    pub async fn observe(&self, status: &ServiceStatus) {
        let mut observed = self.inner.write().await;
        observed.components.insert(
            components::PREDICTOR.to_string(),
            ComponentHealth::for_predictor(status),
        );
        observed
            .components
            .insert(components::CACHE.to_string(), ComponentHealth::for_cache(status));
        observed.state = Some(status.state);
        observed.failure = status.failure.clone();
    }

    /// Stop reporting ready ahead of predictor teardown
    pub async fn begin_shutdown(&self) {
        self.inner.write().await.draining = true;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let observed = self.inner.read().await;
        HealthResponse {
            status: HealthResponse::compute_status(&observed.components),
            predictor_state: observed.state,
            components: observed.components.clone(),
        }
    }

    /// Ready only while the last observed predictor state is `Ready`
    pub async fn readiness(&self) -> ReadinessResponse {
        let observed = self.inner.read().await;
        let reason = if observed.draining {
            Some("Shutting down".to_string())
        } else {
            match observed.state {
                None | Some(ServiceState::Uninitialized) => {
                    Some("Predictor not yet initialized".to_string())
                }
                Some(ServiceState::Ready) => None,
                Some(ServiceState::Failed) => Some(format!(
                    "Predictor failed: {}",
                    observed.failure.as_deref().unwrap_or("unknown cause")
                )),
                Some(other) => Some(format!("Predictor is {}", other)),
            }
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
