//! Prediction output formatting
//!
//! Turns a raw class code (and optional class probabilities) into a
//! presentation-ready `PredictionResult`.

use super::ArtifactBundle;
use crate::error::{GrowthError, Result};
use crate::models::{PredictionRequest, PredictionResult};

/// Capitalizes the first letter of every word and lowercases the rest
///
/// Word boundaries are any non-alphabetic character, so "severely stunted"
/// becomes "Severely Stunted" and "tinggi-normal" becomes "Tinggi-Normal".
pub fn title_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut at_word_start = true;
    for ch in label.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Formats classifier output against the bundle it came from
pub struct OutputFormatter<'a> {
    bundle: &'a ArtifactBundle,
}

impl<'a> OutputFormatter<'a> {
    pub fn new(bundle: &'a ArtifactBundle) -> Self {
        Self { bundle }
    }

    /// Builds the result for `code`
    ///
    /// The confidence is the probability of the predicted class when
    /// probabilities are available.
    pub fn format(
        &self,
        code: usize,
        probabilities: Option<&[f64]>,
        input: &PredictionRequest,
    ) -> Result<PredictionResult> {
        let raw_label = self.bundle.encoder.decode(code).ok_or_else(|| {
            GrowthError::InferenceFailure(format!(
                "classifier produced unknown class code {code} ({} classes)",
                self.bundle.encoder.len()
            ))
        })?;

        let confidence = match probabilities {
            Some(p) => Some(*p.get(code).ok_or_else(|| {
                GrowthError::InferenceFailure(format!(
                    "probability vector has {} entries, class code is {code}",
                    p.len()
                ))
            })?),
            None => None,
        };

        Ok(PredictionResult {
            label: title_case(raw_label),
            raw_label: raw_label.to_string(),
            class_code: code,
            confidence,
            classes: self.bundle.encoder.classes().to_vec(),
            algorithm: self.bundle.metadata.algorithm.clone(),
            input: input.clone(),
        })
    }
}
