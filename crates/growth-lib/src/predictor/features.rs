//! Feature encoding for ML inference
//!
//! Maps human-facing values (sex, outcome label, raw measurements) into the
//! classifier's numeric space and back. The scaler and label encoder are
//! fitted once on the training split and reused unchanged at inference time.

use crate::error::{GrowthError, InputField, Result};
use crate::models::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Standard deviation below which a dimension is only centred
const MIN_STD: f64 = 1e-10;

/// Two-valued sex domain, matched case-insensitively after trimming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SexCodec {
    /// Label encoded as 0
    female: String,
    /// Label encoded as 1
    male: String,
}

impl Default for SexCodec {
    fn default() -> Self {
        Self {
            female: "perempuan".to_string(),
            male: "laki-laki".to_string(),
        }
    }
}

impl SexCodec {
    pub fn new(female: &str, male: &str) -> Result<Self> {
        let female = normalize(female);
        let male = normalize(male);
        if female.is_empty() || male.is_empty() || female == male {
            return Err(GrowthError::invalid_input(
                InputField::Sex,
                format!("sex labels must be two distinct non-empty values, got '{female}' and '{male}'"),
            ));
        }
        Ok(Self { female, male })
    }

    pub fn encode(&self, value: &str) -> Result<u8> {
        let value = normalize(value);
        if value == self.female {
            Ok(0)
        } else if value == self.male {
            Ok(1)
        } else {
            Err(GrowthError::invalid_input(
                InputField::Sex,
                format!("must be '{}' or '{}'", self.male, self.female),
            ))
        }
    }

    /// Label to code mapping, as recorded in cache metadata
    pub fn mapping(&self) -> BTreeMap<String, u8> {
        BTreeMap::from([(self.female.clone(), 0), (self.male.clone(), 1)])
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Stable mapping between outcome labels and integer class codes
///
/// Codes follow the sorted order of the distinct labels, so the same
/// training labels always produce the same codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            classes: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    pub fn encode_all<'a, I>(&self, labels: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .map(|label| {
                self.encode(label).ok_or_else(|| {
                    GrowthError::dataset(format!("label '{label}' was not seen when fitting"))
                })
            })
            .collect()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Per-dimension standardization (zero mean, unit variance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Computes mean and population standard deviation of each dimension
    pub fn fit(samples: &[FeatureVector]) -> Result<Self> {
        if samples.is_empty() {
            return Err(GrowthError::dataset("cannot fit scaler with zero samples"));
        }
        let n = samples.len() as f64;

        let mut mean = vec![0.0; NUM_FEATURES];
        for sample in samples {
            for (m, v) in mean.iter_mut().zip(sample.as_slice()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut std = vec![0.0; NUM_FEATURES];
        for sample in samples {
            for ((s, v), m) in std.iter_mut().zip(sample.as_slice()).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        std.iter_mut().for_each(|s| *s = (*s / n).sqrt());

        Ok(Self { mean, std })
    }

    pub fn transform(&self, features: &FeatureVector) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for (j, value) in features.as_slice().iter().enumerate() {
            let centred = value - self.mean[j];
            out[j] = if self.std[j] > MIN_STD {
                centred / self.std[j]
            } else {
                centred
            };
        }
        out
    }

    pub fn transform_all(&self, samples: &[FeatureVector]) -> Vec<[f64; NUM_FEATURES]> {
        samples.iter().map(|s| self.transform(s)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// Raw input to scaled feature space
pub struct FeatureCodec<'a> {
    sex: &'a SexCodec,
    scaler: &'a StandardScaler,
}

impl<'a> FeatureCodec<'a> {
    pub fn new(sex: &'a SexCodec, scaler: &'a StandardScaler) -> Self {
        Self { sex, scaler }
    }

    /// Builds the unscaled feature vector
    pub fn features(&self, age_months: i64, sex: &str, height_cm: f64) -> Result<FeatureVector> {
        let sex_code = self.sex.encode(sex)?;
        Ok(FeatureVector::new(age_months as f64, f64::from(sex_code), height_cm))
    }

    pub fn encode(&self, age_months: i64, sex: &str, height_cm: f64) -> Result<[f64; NUM_FEATURES]> {
        let features = self.features(age_months, sex, height_cm)?;
        Ok(self.scaler.transform(&features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_codec_default_mapping() {
        let codec = SexCodec::default();
        assert_eq!(codec.encode("Laki-laki").unwrap(), 1);
        assert_eq!(codec.encode("  PEREMPUAN ").unwrap(), 0);
        let err = codec.encode("L").unwrap_err();
        assert_eq!(err.field(), Some(InputField::Sex));
    }

    #[test]
    fn test_sex_codec_custom_labels() {
        let codec = SexCodec::new("F", "M").unwrap();
        assert_eq!(codec.encode("m").unwrap(), 1);
        assert_eq!(codec.encode("f").unwrap(), 0);
        assert_eq!(codec.mapping().len(), 2);
        assert!(SexCodec::new("x", "X").is_err());
        assert!(SexCodec::new("", "x").is_err());
    }

    #[test]
    fn test_label_encoder_sorted_codes() {
        let encoder = LabelEncoder::fit(["Stunted", "Normal", "Tinggi", "Normal", "Severely Stunted"]);
        assert_eq!(
            encoder.classes(),
            &["Normal", "Severely Stunted", "Stunted", "Tinggi"]
        );
        assert_eq!(encoder.encode("Normal"), Some(0));
        assert_eq!(encoder.encode("Tinggi"), Some(3));
        assert_eq!(encoder.encode("Unknown"), None);
        assert_eq!(encoder.decode(2), Some("Stunted"));
        assert_eq!(encoder.decode(4), None);
    }

    #[test]
    fn test_label_encoder_order_independent_of_input_order() {
        let a = LabelEncoder::fit(["b", "a", "c"]);
        let b = LabelEncoder::fit(["c", "b", "a", "a"]);
        assert_eq!(a, b);
        assert!(a.encode_all(["a", "z"]).is_err());
    }

    #[test]
    fn test_scaler_standardizes() {
        let samples = vec![
            FeatureVector::new(0.0, 0.0, 50.0),
            FeatureVector::new(10.0, 1.0, 70.0),
            FeatureVector::new(20.0, 0.0, 90.0),
            FeatureVector::new(30.0, 1.0, 110.0),
        ];
        let scaler = StandardScaler::fit(&samples).unwrap();
        assert_eq!(scaler.n_features(), NUM_FEATURES);

        let scaled = scaler.transform_all(&samples);
        for j in 0..NUM_FEATURES {
            let mean: f64 = scaled.iter().map(|s| s[j]).sum::<f64>() / scaled.len() as f64;
            let var: f64 = scaled.iter().map(|s| (s[j] - mean).powi(2)).sum::<f64>() / scaled.len() as f64;
            assert!(mean.abs() < 1e-9, "mean of dim {} was {}", j, mean);
            assert!((var - 1.0).abs() < 1e-9, "variance of dim {} was {}", j, var);
        }
    }

    #[test]
    fn test_scaler_constant_dimension_is_centred_only() {
        let samples = vec![
            FeatureVector::new(5.0, 1.0, 80.0),
            FeatureVector::new(15.0, 1.0, 90.0),
        ];
        let scaler = StandardScaler::fit(&samples).unwrap();
        let out = scaler.transform(&FeatureVector::new(10.0, 1.0, 85.0));
        assert_eq!(out[1], 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_scaler_reuses_fitted_statistics() {
        let train = vec![FeatureVector::new(0.0, 0.0, 60.0), FeatureVector::new(20.0, 1.0, 80.0)];
        let scaler = StandardScaler::fit(&train).unwrap();
        let before = scaler.clone();
        let _ = scaler.transform(&FeatureVector::new(60.0, 0.0, 200.0));
        assert_eq!(scaler, before);
        assert!(StandardScaler::fit(&[]).is_err());
    }

    #[test]
    fn test_feature_codec_encodes_and_validates_sex() {
        let sex = SexCodec::default();
        let scaler = StandardScaler::fit(&[
            FeatureVector::new(0.0, 0.0, 50.0),
            FeatureVector::new(60.0, 1.0, 110.0),
        ])
        .unwrap();
        let codec = FeatureCodec::new(&sex, &scaler);
        let features = codec.features(12, "laki-laki", 75.0).unwrap();
        assert_eq!(features.0, [12.0, 1.0, 75.0]);
        assert!(codec.encode(12, "unknown", 75.0).is_err());
    }
}
