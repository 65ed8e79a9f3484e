//! Training dataset loading
//!
//! A dataset is a read-only table of labeled rows with four columns:
//! age in months, sex, height in cm and the outcome label. Rows are loaded
//! once per training run.

use crate::error::{GrowthError, Result};
use crate::models::DatasetRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Anything that can produce a dataset for training
pub trait DatasetSource: Send + Sync {
    fn load(&self) -> Result<Dataset>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// In-memory labeled dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn new(rows: Vec<DatasetRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct trimmed outcome labels in sorted order
    pub fn distinct_labels(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.label.trim()).collect()
    }
}

impl DatasetSource for Dataset {
    fn load(&self) -> Result<Dataset> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory dataset ({} rows)", self.rows.len())
    }
}

/// Header names of the four required columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetColumns {
    pub age: String,
    pub sex: String,
    pub height: String,
    pub label: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            age: "Umur".to_string(),
            sex: "Jenis Kelamin".to_string(),
            height: "Tinggi Badan".to_string(),
            label: "Stunting".to_string(),
        }
    }
}

/// CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvDatasetSource {
    path: PathBuf,
    columns: DatasetColumns,
}

impl CsvDatasetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            columns: DatasetColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: DatasetColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for CsvDatasetSource {
    fn load(&self) -> Result<Dataset> {
        if !self.path.exists() {
            return Err(GrowthError::dataset(format!(
                "dataset file not found: {}",
                self.path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            GrowthError::dataset(format!("failed to open {}: {e}", self.path.display()))
        })?;

        let headers = reader
            .headers()
            .map_err(|e| GrowthError::dataset(format!("failed to read headers: {e}")))?
            .clone();

        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| {
                    GrowthError::dataset(format!(
                        "missing column '{name}' (available: {:?})",
                        headers.iter().collect::<Vec<_>>()
                    ))
                })
        };

        let age_idx = column_index(&self.columns.age)?;
        let sex_idx = column_index(&self.columns.sex)?;
        let height_idx = column_index(&self.columns.height)?;
        let label_idx = column_index(&self.columns.label)?;

        let mut rows = Vec::new();
        // Header is line 1
        for (offset, record) in reader.records().enumerate() {
            let line = offset + 2;
            let record = record
                .map_err(|e| GrowthError::dataset(format!("line {line}: failed to read row: {e}")))?;
            let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

            rows.push(DatasetRow {
                age_months: parse_age(cell(age_idx), line)?,
                sex: cell(sex_idx).to_string(),
                height_cm: parse_height(cell(height_idx), line)?,
                label: cell(label_idx).to_string(),
            });
        }

        debug!(
            path = %self.path.display(),
            rows = rows.len(),
            "Loaded dataset"
        );

        Ok(Dataset::new(rows))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn parse_age(value: &str, line: usize) -> Result<i64> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| GrowthError::dataset(format!("line {line}: age '{value}' is not a number")))?;
    if parsed.fract() != 0.0 || !parsed.is_finite() {
        return Err(GrowthError::dataset(format!(
            "line {line}: age '{value}' is not a whole number of months"
        )));
    }
    Ok(parsed as i64)
}

fn parse_height(value: &str, line: usize) -> Result<f64> {
    value
        .parse()
        .map_err(|_| GrowthError::dataset(format!("line {line}: height '{value}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_csv_loader_default_columns() {
        let file = write_csv(
            "Umur,Jenis Kelamin,Tinggi Badan,Stunting\n\
             12,Laki-laki,72.5,Normal\n\
             24,Perempuan,70.0,Stunted\n",
        );
        let dataset = CsvDatasetSource::new(file.path()).load().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[0].age_months, 12);
        assert_eq!(dataset.rows()[1].sex, "Perempuan");
        assert_eq!(dataset.rows()[1].label, "Stunted");
        assert_eq!(
            dataset.distinct_labels().into_iter().collect::<Vec<_>>(),
            vec!["Normal", "Stunted"]
        );
    }

    #[test]
    fn test_csv_loader_custom_columns_and_column_order() {
        let file = write_csv("label,height,sex,age\nTinggi,110.0,laki-laki,36\n");
        let columns = DatasetColumns {
            age: "age".into(),
            sex: "sex".into(),
            height: "height".into(),
            label: "label".into(),
        };
        let dataset = CsvDatasetSource::new(file.path())
            .with_columns(columns)
            .load()
            .unwrap();
        assert_eq!(dataset.rows()[0].height_cm, 110.0);
        assert_eq!(dataset.rows()[0].label, "Tinggi");
    }

    #[test]
    fn test_csv_loader_missing_column() {
        let file = write_csv("Umur,Jenis Kelamin,Tinggi Badan\n12,Laki-laki,72.5\n");
        let err = CsvDatasetSource::new(file.path()).load().unwrap_err();
        assert!(matches!(err, GrowthError::DatasetInvalid(_)));
        assert!(err.to_string().contains("Stunting"));
    }

    #[test]
    fn test_csv_loader_missing_file() {
        let err = CsvDatasetSource::new("/nonexistent/data.csv").load().unwrap_err();
        assert!(matches!(err, GrowthError::DatasetInvalid(_)));
    }

    #[test]
    fn test_csv_loader_rejects_fractional_age() {
        let file = write_csv("Umur,Jenis Kelamin,Tinggi Badan,Stunting\n12.5,Laki-laki,72.5,Normal\n");
        let err = CsvDatasetSource::new(file.path()).load().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
