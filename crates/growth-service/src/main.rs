//! Growth service - hosts the child growth predictor
//!
//! Loads configuration, brings the predictor to Ready from the artifact
//! cache or by training, then serves health, readiness, metrics and status
//! endpoints until interrupted.

use anyhow::{Context, Result};
use growth_lib::{
    health::HealthRegistry,
    PredictorService, ServiceState,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = SERVICE_VERSION, "Starting growth-service");

    let config = config::ServiceConfig::load()?;
    info!(
        dataset = %config.dataset_path.display(),
        cache_dir = %config.cache_dir.display(),
        auto_cache = config.auto_cache,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    let service = Arc::new(PredictorService::new(config.predictor_config()?));

    // Training is CPU-bound, keep it off the async workers
    let dataset = config.dataset_source();
    let state = {
        let service = Arc::clone(&service);
        tokio::task::spawn_blocking(move || service.initialize(&dataset))
            .await
            .context("Initialization task panicked")?
    };
    health_registry.observe(&service.status()).await;

    match state {
        ServiceState::Ready => info!("Predictor ready"),
        other => {
            let failure = service.status().failure.unwrap_or_default();
            error!(state = %other, failure = %failure, "Predictor not ready, serving diagnostics only");
        }
    }

    let app_state = Arc::new(api::AppState::new(Arc::clone(&service), health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("SIGINT received, shutting down");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => warn!("API server exited"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
    }

    health_registry.begin_shutdown().await;
    service.shutdown();

    Ok(())
}
