//! Linear-kernel support vector classifier
//!
//! Multi-class problems are handled one-vs-rest: one binary machine per
//! class, prediction is the argmax of the decision values. Each machine
//! minimizes
//!
//! ```text
//! min  λ||w||² + (1/n) Σᵢ max(0, 1 - yᵢ(w·xᵢ + b))
//! ```
//!
//! with λ = 1/(2nC), using batch subgradient descent over the samples in
//! their given order. Training is deterministic.
//!
//! When probability estimates are requested, a Platt sigmoid is fitted to
//! each machine's training decision values and the per-class estimates are
//! normalized to sum to one.

use super::Classifier;
use crate::error::{GrowthError, Result};
use serde::{Deserialize, Serialize};

pub const ALGORITHM: &str = "SVM (Linear Kernel)";

/// Hyperparameters for the subgradient solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Regularization parameter; larger C means less regularization
    pub c: f64,
    pub learning_rate: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    /// Stop once the weight change of an epoch falls below this
    pub tol: f64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.01,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

/// P(positive | f) = 1 / (1 + exp(a·f + b))
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PlattSigmoid {
    a: f64,
    b: f64,
}

impl PlattSigmoid {
    fn probability(&self, decision: f64) -> f64 {
        let f = decision * self.a + self.b;
        if f >= 0.0 {
            (-f).exp() / (1.0 + (-f).exp())
        } else {
            1.0 / (1.0 + f.exp())
        }
    }

    /// Newton's method with backtracking line search on the regularized
    /// targets of Platt (2000), as refined by Lin, Lin and Weng (2007).
    fn fit(decisions: &[f64], positive: &[bool]) -> Self {
        const MAX_ITER: usize = 100;
        const MIN_STEP: f64 = 1e-10;
        const SIGMA: f64 = 1e-12;
        const EPS: f64 = 1e-5;

        let prior1 = positive.iter().filter(|p| **p).count() as f64;
        let prior0 = positive.len() as f64 - prior1;
        let hi = (prior1 + 1.0) / (prior1 + 2.0);
        let lo = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = positive.iter().map(|p| if *p { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            decisions
                .iter()
                .zip(&targets)
                .map(|(d, t)| {
                    let f = d * a + b;
                    if f >= 0.0 {
                        t * f + (1.0 + (-f).exp()).ln()
                    } else {
                        (t - 1.0) * f + (1.0 + f.exp()).ln()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (d, t) in decisions.iter().zip(&targets) {
                let f = d * a + b;
                let (p, q) = if f >= 0.0 {
                    ((-f).exp() / (1.0 + (-f).exp()), 1.0 / (1.0 + (-f).exp()))
                } else {
                    (1.0 / (1.0 + f.exp()), f.exp() / (1.0 + f.exp()))
                };
                let d2 = p * q;
                h11 += d * d * d2;
                h22 += d2;
                h21 += d * d2;
                let d1 = t - p;
                g1 += d * d1;
                g2 += d1;
            }

            if g1.abs() < EPS && g2.abs() < EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let (new_a, new_b) = (a + step * da, b + step * db);
                let new_f = objective(new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }
            if step < MIN_STEP {
                break;
            }
        }

        Self { a, b }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryMachine {
    weights: Vec<f64>,
    bias: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    platt: Option<PlattSigmoid>,
}

impl BinaryMachine {
    fn decision(&self, x: &[f64]) -> f64 {
        self.bias + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }

    fn fit<X: AsRef<[f64]>>(x: &[X], y_signed: &[f64], n_features: usize, params: &SvmParams) -> Self {
        let n_samples = x.len();
        let mut w = vec![0.0; n_features];
        let mut b = 0.0;
        let lambda = 1.0 / (2.0 * n_samples as f64 * params.c);

        for epoch in 0..params.max_iter {
            let eta = params.learning_rate / (1.0 + epoch as f64 * 0.01);
            let prev_w = w.clone();
            let prev_b = b;

            for (xi, &yi) in x.iter().zip(y_signed) {
                let xi = xi.as_ref();
                let decision = b + w.iter().zip(xi).map(|(wj, v)| wj * v).sum::<f64>();

                if yi * decision < 1.0 {
                    for (wj, v) in w.iter_mut().zip(xi) {
                        *wj -= eta * (2.0 * lambda * *wj - yi * v);
                    }
                    b += eta * yi;
                } else {
                    for wj in &mut w {
                        *wj -= eta * 2.0 * lambda * *wj;
                    }
                }
            }

            let change = w
                .iter()
                .zip(&prev_w)
                .map(|(a, p)| (a - p).powi(2))
                .sum::<f64>()
                + (b - prev_b).powi(2);
            if change.sqrt() < params.tol {
                break;
            }
        }

        Self {
            weights: w,
            bias: b,
            platt: None,
        }
    }
}

/// One-vs-rest linear SVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    params: SvmParams,
    n_features: usize,
    machines: Vec<BinaryMachine>,
}

impl LinearSvm {
    /// Trains one machine per class on scaled features
    ///
    /// `y` holds class codes in `0..n_classes`.
    pub fn fit<X: AsRef<[f64]>>(
        x: &[X],
        y: &[usize],
        n_classes: usize,
        params: SvmParams,
        probability: bool,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(GrowthError::dataset("features and labels must have the same number of samples"));
        }
        if x.is_empty() {
            return Err(GrowthError::dataset("cannot fit classifier with zero samples"));
        }
        if n_classes < 2 {
            return Err(GrowthError::dataset(format!(
                "need at least 2 classes to train, found {n_classes}"
            )));
        }
        if let Some(bad) = y.iter().find(|c| **c >= n_classes) {
            return Err(GrowthError::dataset(format!(
                "class code {bad} out of range for {n_classes} classes"
            )));
        }
        let n_features = x[0].as_ref().len();
        if x.iter().any(|row| row.as_ref().len() != n_features) {
            return Err(GrowthError::dataset("feature rows have differing lengths"));
        }

        let machines = (0..n_classes)
            .map(|class| {
                let y_signed: Vec<f64> = y
                    .iter()
                    .map(|&c| if c == class { 1.0 } else { -1.0 })
                    .collect();
                let mut machine = BinaryMachine::fit(x, &y_signed, n_features, &params);
                if probability {
                    let decisions: Vec<f64> = x.iter().map(|xi| machine.decision(xi.as_ref())).collect();
                    let positive: Vec<bool> = y.iter().map(|&c| c == class).collect();
                    machine.platt = Some(PlattSigmoid::fit(&decisions, &positive));
                }
                machine
            })
            .collect();

        Ok(Self {
            params,
            n_features,
            machines,
        })
    }

    /// Decision value of every one-vs-rest machine
    pub fn decision_function(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.n_features {
            return Err(GrowthError::InferenceFailure(format!(
                "feature dimension mismatch: got {}, expected {}",
                x.len(),
                self.n_features
            )));
        }
        let decisions: Vec<f64> = self.machines.iter().map(|m| m.decision(x)).collect();
        if decisions.iter().any(|d| !d.is_finite()) {
            return Err(GrowthError::InferenceFailure("non-finite decision value".to_string()));
        }
        Ok(decisions)
    }

    /// Fraction of samples classified correctly
    pub fn score<X: AsRef<[f64]>>(&self, x: &[X], y: &[usize]) -> Result<f64> {
        if x.is_empty() {
            return Ok(0.0);
        }
        let mut correct = 0usize;
        for (xi, &yi) in x.iter().zip(y) {
            if self.predict(xi.as_ref())? == yi {
                correct += 1;
            }
        }
        Ok(correct as f64 / x.len() as f64)
    }

    pub fn has_probability(&self) -> bool {
        self.machines.iter().all(|m| m.platt.is_some())
    }
}

impl Classifier for LinearSvm {
    fn algorithm(&self) -> &str {
        ALGORITHM
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.machines.len()
    }

    fn predict(&self, features: &[f64]) -> Result<usize> {
        let decisions = self.decision_function(features)?;
        let mut best = 0;
        for (class, value) in decisions.iter().enumerate().skip(1) {
            if *value > decisions[best] {
                best = class;
            }
        }
        Ok(best)
    }

    fn predict_proba(&self, features: &[f64]) -> Option<Result<Vec<f64>>> {
        if !self.has_probability() {
            return None;
        }
        let probabilities = self.decision_function(features).map(|decisions| {
            let raw: Vec<f64> = self
                .machines
                .iter()
                .zip(&decisions)
                .filter_map(|(m, d)| m.platt.map(|p| p.probability(*d)))
                .collect();
            let total: f64 = raw.iter().sum();
            if total > 0.0 {
                raw.iter().map(|p| p / total).collect()
            } else {
                vec![1.0 / raw.len() as f64; raw.len()]
            }
        });
        Some(probabilities)
    }
}
