//! Training and prediction commands

use anyhow::{Context, Result};
use growth_lib::{
    BatchOutcome, CacheLookup, CacheMiss, CacheStatus, DatasetSource, ModelInfo, ModelSource,
    PredictionRequest, PredictionResult,
};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tabled::Tabled;

use super::Session;
use crate::output::{
    color_label, color_state, format_confidence, format_percent, print_json, print_rows,
    print_success, print_warning, OutputFormat,
};

/// Row for training metrics table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for prediction tables
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Age (months)")]
    age: i64,
    #[tabled(rename = "Sex")]
    sex: String,
    #[tabled(rename = "Height (cm)")]
    height: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

impl PredictionRow {
    fn success(index: usize, result: &PredictionResult) -> Self {
        Self {
            index,
            age: result.input.age_months,
            sex: result.input.sex.clone(),
            height: format!("{:.1}", result.input.height_cm),
            result: color_label(&result.label),
            confidence: format_confidence(result.confidence),
        }
    }

    fn failure(index: usize, input: &PredictionRequest, error: &str) -> Self {
        Self {
            index,
            age: input.age_months,
            sex: input.sex.clone(),
            height: format!("{:.1}", input.height_cm),
            result: color_state("failed") + ": " + error,
            confidence: "-".to_string(),
        }
    }
}

/// JSON shape of one batch entry
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BatchEntry<'a> {
    Ok {
        #[serde(flatten)]
        result: &'a PredictionResult,
    },
    Error {
        input: &'a PredictionRequest,
        kind: &'static str,
        message: String,
    },
}

/// Train from the dataset; the cached bundle is replaced only once training succeeds
pub fn train(session: &Session, probability: bool) -> Result<()> {
    let dataset = session
        .dataset_source()
        .load()
        .with_context(|| format!("Failed to load dataset {}", session.dataset.display()))?;
    let model = session
        .trainer(probability)
        .train(&dataset)
        .context("Training failed")?;

    let mut bundle = model.bundle;
    if session.auto_cache {
        bundle.metadata = session
            .store()
            .save(&bundle)
            .context("Model trained but could not be cached")?;
    }
    let info = ModelInfo::from_bundle(&bundle, ModelSource::Training);

    match session.format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            print_rows(metric_rows(&info));
            if session.auto_cache {
                print_success(&format!("Model saved to {}", session.cache_dir.display()));
            } else {
                print_warning("Caching disabled, model was not saved");
            }
        }
    }
    Ok(())
}

/// Classify a single child
pub fn predict(session: &Session, age: i64, sex: &str, height: f64) -> Result<()> {
    let service = session.ready_service()?;
    let result = service.predict(age, sex, height)?;

    match session.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_rows(vec![PredictionRow::success(1, &result)]),
    }
    Ok(())
}

/// Classify every request in a JSON array file ("-" reads stdin)
pub fn batch(session: &Session, input: &Path) -> Result<()> {
    let requests = read_requests(input)?;
    let service = session.ready_service()?;
    let outcomes = service.batch_predict(&requests)?;
    let failed = outcomes.iter().filter(|o| o.is_err()).count();

    match session.format {
        OutputFormat::Json => {
            let entries: Vec<BatchEntry<'_>> = outcomes.iter().map(batch_entry).collect();
            print_json(&entries)?;
        }
        OutputFormat::Table => {
            let rows = outcomes
                .iter()
                .enumerate()
                .map(|(i, outcome)| match outcome {
                    Ok(result) => PredictionRow::success(i + 1, result),
                    Err(failure) => {
                        PredictionRow::failure(i + 1, &failure.input, &failure.error.to_string())
                    }
                })
                .collect();
            print_rows(rows);
            println!(
                "\nTotal: {} predictions, {} failed",
                outcomes.len(),
                failed
            );
        }
    }
    Ok(())
}

/// What the next start would do with the current cache
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum NextStart {
    Load,
    Train,
    Fail,
}

#[derive(Serialize)]
struct StatusReport {
    next_start: NextStart,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    cache: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<ModelInfo>,
}

/// Inspect the cached model without training or writing anything
pub fn status(session: &Session) -> Result<()> {
    let report = status_report(session);

    match session.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let next = match report.next_start {
                NextStart::Load => color_state("ready") + " (load from cache)",
                NextStart::Train => color_state("training") + " (train from dataset)",
                NextStart::Fail => color_state("failed"),
            };
            println!("Cache: {}", report.cache.directory.display());
            println!("Next start: {}", next);
            if let Some(reason) = &report.reason {
                print_warning(reason);
            }
            if let Some(info) = &report.model {
                print_rows(metric_rows(info));
            }
        }
    }
    Ok(())
}

fn status_report(session: &Session) -> StatusReport {
    let store = session.store();
    let cache = store.status();
    let (next_start, reason, model) = if !store.is_enabled() {
        (NextStart::Train, Some(CacheMiss::Disabled.to_string()), None)
    } else {
        match store.load() {
            Ok(CacheLookup::Hit(bundle)) => {
                let expected = session.predictor_config(false).sex.mapping();
                if bundle.metadata.sex_mapping != expected {
                    (NextStart::Train, Some(CacheMiss::SexMappingChanged.to_string()), None)
                } else {
                    let info = ModelInfo::from_bundle(&bundle, ModelSource::Cache);
                    (NextStart::Load, None, Some(info))
                }
            }
            Ok(CacheLookup::Miss(miss)) => (NextStart::Train, Some(miss.to_string()), None),
            Err(e) => (NextStart::Fail, Some(e.to_string()), None),
        }
    };
    StatusReport {
        next_start,
        reason,
        cache,
        model,
    }
}

fn read_requests(input: &Path) -> Result<Vec<PredictionRequest>> {
    let content = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read requests from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    serde_json::from_str(&content).context("Batch input must be a JSON array of requests")
}

fn batch_entry(outcome: &BatchOutcome) -> BatchEntry<'_> {
    match outcome {
        Ok(result) => BatchEntry::Ok { result },
        Err(failure) => BatchEntry::Error {
            input: &failure.input,
            kind: failure.error.kind(),
            message: failure.error.to_string(),
        },
    }
}

fn metric_rows(info: &ModelInfo) -> Vec<MetricRow> {
    let mut rows = vec![
        row("Algorithm", info.algorithm.clone()),
        row("Source", format!("{:?}", info.source).to_lowercase()),
        row("Classes", info.classes.join(", ")),
        row("Features", info.n_features.to_string()),
        row("Created", info.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        row("Confidence", if info.probability { "enabled" } else { "disabled" }.to_string()),
    ];
    if let Some(training) = &info.training {
        rows.push(row("Samples", format!(
            "{} ({} train / {} test)",
            training.n_samples, training.n_train, training.n_test
        )));
        rows.push(row("Train accuracy", format_percent(training.train_accuracy)));
        rows.push(row(
            "Test accuracy",
            training.test_accuracy.map(format_percent).unwrap_or_else(|| "-".to_string()),
        ));
        rows.push(row("Duration", format!("{} ms", training.duration_ms)));
    }
    rows
}

fn row(metric: &str, value: String) -> MetricRow {
    MetricRow {
        metric: metric.to_string(),
        value,
    }
}
