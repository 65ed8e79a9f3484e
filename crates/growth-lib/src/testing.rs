//! Shared fixtures for unit tests

use crate::dataset::Dataset;
use crate::models::DatasetRow;
use crate::predictor::{ArtifactBundle, SexCodec, Trainer, TrainerConfig};

pub fn row(age: i64, sex: &str, height: f64, label: &str) -> DatasetRow {
    DatasetRow {
        age_months: age,
        sex: sex.to_string(),
        height_cm: height,
        label: label.to_string(),
    }
}

/// Two classes: under 24 months, "Stunted" rows are all shorter than 70 cm
pub fn growth_dataset() -> Dataset {
    let mut rows = Vec::new();
    for age in 0..24 {
        for sex in ["Laki-laki", "Perempuan"] {
            rows.push(row(age, sex, 50.0 + age as f64 * 0.5, "Stunted"));
            rows.push(row(age, sex, 75.0 + age as f64 * 0.8, "Normal"));
        }
    }
    for age in 24..=60 {
        let sex = if age % 2 == 0 { "Laki-laki" } else { "Perempuan" };
        rows.push(row(age, sex, 85.0 + (age - 24) as f64 * 0.6, "Normal"));
    }
    Dataset::new(rows)
}

pub fn trained_bundle() -> ArtifactBundle {
    Trainer::new(TrainerConfig::default(), SexCodec::default())
        .train(&growth_dataset())
        .expect("fixture dataset trains")
        .bundle
}
