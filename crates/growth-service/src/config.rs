//! Service configuration

use anyhow::{Context, Result};
use growth_lib::{
    predictor::{SexCodec, SvmParams, TrainerConfig},
    CsvDatasetSource, DatasetColumns, PredictorConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the optional config file
pub const CONFIG_FILE_ENV: &str = "GROWTH_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "growth-service.toml";

/// Service configuration, from an optional file overlaid with `GROWTH_*` variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Labeled CSV used when no cached model is available
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Read and write the artifact cache
    #[serde(default = "default_true")]
    pub auto_cache: bool,

    #[serde(default = "default_age_column")]
    pub age_column: String,
    #[serde(default = "default_sex_column")]
    pub sex_column: String,
    #[serde(default = "default_height_column")]
    pub height_column: String,
    #[serde(default = "default_label_column")]
    pub label_column: String,

    /// Sex label encoded as 0
    #[serde(default = "default_sex_female")]
    pub sex_female: String,
    /// Sex label encoded as 1
    #[serde(default = "default_sex_male")]
    pub sex_male: String,

    #[serde(default)]
    pub min_age_months: i64,
    #[serde(default = "default_max_age")]
    pub max_age_months: i64,
    #[serde(default = "default_min_height")]
    pub min_height_cm: f64,
    #[serde(default = "default_max_height")]
    pub max_height_cm: f64,

    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// SVM regularization parameter
    #[serde(default = "default_svm_c")]
    pub svm_c: f64,
    /// Fit probability estimates so predictions carry a confidence
    #[serde(default)]
    pub probability: bool,
}

fn default_api_port() -> u16 {
    8080
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/stunting.csv")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("model_cache")
}

fn default_true() -> bool {
    true
}

fn default_age_column() -> String {
    DatasetColumns::default().age
}

fn default_sex_column() -> String {
    DatasetColumns::default().sex
}

fn default_height_column() -> String {
    DatasetColumns::default().height
}

fn default_label_column() -> String {
    DatasetColumns::default().label
}

fn default_sex_female() -> String {
    "perempuan".to_string()
}

fn default_sex_male() -> String {
    "laki-laki".to_string()
}

fn default_max_age() -> i64 {
    60
}

fn default_min_height() -> f64 {
    30.0
}

fn default_max_height() -> f64 {
    200.0
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_svm_c() -> f64 {
    SvmParams::default().c
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            dataset_path: default_dataset_path(),
            cache_dir: default_cache_dir(),
            auto_cache: true,
            age_column: default_age_column(),
            sex_column: default_sex_column(),
            height_column: default_height_column(),
            label_column: default_label_column(),
            sex_female: default_sex_female(),
            sex_male: default_sex_male(),
            min_age_months: 0,
            max_age_months: default_max_age(),
            min_height_cm: default_min_height(),
            max_height_cm: default_max_height(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            svm_c: default_svm_c(),
            probability: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the config file (if any) and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(Path::new(&file))
    }

    /// Load from `path` (optional on disk), overlaid with `GROWTH_*` variables
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("GROWTH").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn predictor_config(&self) -> Result<PredictorConfig> {
        let sex = SexCodec::new(&self.sex_female, &self.sex_male).context("Invalid sex labels")?;
        if self.min_age_months > self.max_age_months {
            anyhow::bail!(
                "min_age_months ({}) exceeds max_age_months ({})",
                self.min_age_months,
                self.max_age_months
            );
        }
        if self.min_height_cm > self.max_height_cm {
            anyhow::bail!(
                "min_height_cm ({}) exceeds max_height_cm ({})",
                self.min_height_cm,
                self.max_height_cm
            );
        }

        Ok(PredictorConfig {
            cache_dir: self.cache_dir.clone(),
            auto_cache: self.auto_cache,
            sex,
            age_range: self.min_age_months..=self.max_age_months,
            height_range: self.min_height_cm..=self.max_height_cm,
            trainer: TrainerConfig {
                test_fraction: self.test_fraction,
                seed: self.seed,
                svm: SvmParams {
                    c: self.svm_c,
                    ..SvmParams::default()
                },
                probability: self.probability,
            },
        })
    }

    pub fn dataset_source(&self) -> CsvDatasetSource {
        CsvDatasetSource::new(&self.dataset_path).with_columns(DatasetColumns {
            age: self.age_column.clone(),
            sex: self.sex_column.clone(),
            height: self.height_column.clone(),
            label: self.label_column.clone(),
        })
    }
}
