//! Command implementations

pub mod cache;
pub mod model;

use crate::output::OutputFormat;
use anyhow::{bail, Result};
use growth_lib::{
    predictor::{Trainer, TrainerConfig},
    ArtifactStore, CsvDatasetSource, PredictorConfig, PredictorService, ServiceState,
};
use std::path::PathBuf;

/// Settings shared by every command, resolved from flags, env and config file
#[derive(Debug, Clone)]
pub struct Session {
    pub cache_dir: PathBuf,
    pub dataset: PathBuf,
    pub auto_cache: bool,
    pub format: OutputFormat,
}

impl Session {
    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.cache_dir).with_enabled(self.auto_cache)
    }

    pub fn dataset_source(&self) -> CsvDatasetSource {
        CsvDatasetSource::new(&self.dataset)
    }

    pub fn predictor_config(&self, probability: bool) -> PredictorConfig {
        PredictorConfig {
            cache_dir: self.cache_dir.clone(),
            auto_cache: self.auto_cache,
            trainer: TrainerConfig {
                probability,
                ..TrainerConfig::default()
            },
            ..PredictorConfig::default()
        }
    }

    pub fn trainer(&self, probability: bool) -> Trainer {
        let config = self.predictor_config(probability);
        Trainer::new(config.trainer, config.sex)
    }

    /// A service brought to Ready from the cache, or by training on the dataset
    pub fn ready_service(&self) -> Result<PredictorService> {
        let service = PredictorService::new(self.predictor_config(false));
        if service.initialize(&self.dataset_source()) != ServiceState::Ready {
            let failure = service
                .status()
                .failure
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Predictor failed to initialize: {}", failure);
        }
        Ok(service)
    }
}
