//! # Class Model Module
//!
//! Per-class diagonal Gaussian statistics over cepstral vectors, the trainer
//! that estimates them, and the serializable [`ModelSet`] that bundles a
//! trained set with the frame geometry it was trained at.
//!
//! ## Features
//! - Explicit two-pass mean / population standard deviation (default)
//! - Welford's single-pass estimator as an alternative
//! - Standard deviations floored to a positive epsilon
//! - JSON persistence: label, order, mean and std-dev per class

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

/// How a trainer accumulates mean and variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceMethod {
    /// Sum for the mean, then a second pass over squared deviations.
    #[default]
    TwoPass,
    /// Welford's running update; one pass, better conditioned.
    Welford,
}

/// Trained statistics of one recognition class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    label: String,
    order: usize,
    mean: Vec<f64>,
    std_dev: Vec<f64>,
}

impl ClassModel {
    /// Builds a model from explicit statistics.
    ///
    /// # Returns
    /// * `Err(EngineError::ModelMismatch)` - Mean and std-dev lengths differ,
    ///   are empty, or contain non-finite values, or a std-dev is not positive
    pub fn new(label: impl Into<String>, mean: Vec<f64>, std_dev: Vec<f64>) -> Result<Self> {
        let model = Self {
            label: label.into(),
            order: mean.len(),
            mean,
            std_dev,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks the invariants a deserialized model might violate.
    pub fn validate(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(EngineError::model_mismatch(format!(
                "class '{}' has no coefficients",
                self.label
            )));
        }
        if self.mean.len() != self.order || self.std_dev.len() != self.order {
            return Err(EngineError::model_mismatch(format!(
                "class '{}' declares order {} but has {} means and {} std-devs",
                self.label,
                self.order,
                self.mean.len(),
                self.std_dev.len()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(EngineError::model_mismatch(format!(
                "class '{}' has a non-finite mean",
                self.label
            )));
        }
        if self.std_dev.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(EngineError::model_mismatch(format!(
                "class '{}' has a non-positive or non-finite std-dev",
                self.label
            )));
        }
        Ok(())
    }

    /// Class label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of cepstral coefficients (K).
    pub fn order(&self) -> usize {
        self.order
    }

    /// Per-coefficient means.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Per-coefficient population standard deviations.
    pub fn std_dev(&self) -> &[f64] {
        &self.std_dev
    }

    /// Unnormalized diagonal-Gaussian log-likelihood; higher is a better fit.
    ///
    /// `-Σ_d [ ln σ_d + (x_d - μ_d)² / (2 σ_d²) ]`
    ///
    /// # Returns
    /// * `Err(EngineError::ModelMismatch)` - `x` has a different length than the model
    pub fn log_likelihood(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.order {
            return Err(EngineError::model_mismatch(format!(
                "vector of length {} scored against class '{}' of order {}",
                x.len(),
                self.label,
                self.order
            )));
        }
        let penalty: f64 = x
            .iter()
            .zip(&self.mean)
            .zip(&self.std_dev)
            .map(|((&xd, &mu), &sigma)| {
                let diff = xd - mu;
                sigma.ln() + diff * diff / (2.0 * sigma * sigma)
            })
            .sum();
        Ok(-penalty)
    }
}

/// Estimates [`ClassModel`]s from cepstral vectors.
#[derive(Debug, Clone, Copy)]
pub struct GaussianTrainer {
    order: usize,
    method: VarianceMethod,
    std_floor: f64,
}

impl GaussianTrainer {
    /// Creates a trainer for vectors of `order` coefficients.
    pub fn new(order: usize, method: VarianceMethod, std_floor: f64) -> Result<Self> {
        if order == 0 {
            return Err(EngineError::config("cepstral order must be at least 1"));
        }
        if !(std_floor.is_finite() && std_floor > 0.0) {
            return Err(EngineError::config(format!(
                "std floor must be positive: {std_floor}"
            )));
        }
        Ok(Self {
            order,
            method,
            std_floor,
        })
    }

    /// Number of coefficients each training vector must have.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Fits mean and population standard deviation of `vectors`.
    ///
    /// # Arguments
    /// * `label` - Class label stored in the model
    /// * `vectors` - One cepstral vector per training frame
    ///
    /// # Returns
    /// * `Ok(model)` - Statistics with every std-dev at least the floor
    /// * `Err(EngineError::NoTrainingData)` - `vectors` is empty
    /// * `Err(EngineError::ModelMismatch)` - A vector has the wrong length
    pub fn fit<V: AsRef<[f64]>>(&self, label: &str, vectors: &[V]) -> Result<ClassModel> {
        if vectors.is_empty() {
            return Err(EngineError::NoTrainingData);
        }
        if let Some(bad) = vectors.iter().find(|v| v.as_ref().len() != self.order) {
            return Err(EngineError::model_mismatch(format!(
                "training vector of length {} for class '{}' of order {}",
                bad.as_ref().len(),
                label,
                self.order
            )));
        }

        let (mean, variance) = match self.method {
            VarianceMethod::TwoPass => two_pass(vectors, self.order),
            VarianceMethod::Welford => welford(vectors, self.order),
        };

        let mut floored = 0;
        let std_dev: Vec<f64> = variance
            .iter()
            .map(|&v| {
                let sigma = v.sqrt();
                if sigma.is_finite() && sigma >= self.std_floor {
                    sigma
                } else {
                    floored += 1;
                    self.std_floor
                }
            })
            .collect();
        if floored > 0 {
            warn!(
                label,
                floored,
                floor = self.std_floor,
                "degenerate std-dev clamped"
            );
        }

        ClassModel::new(label, mean, std_dev)
    }
}

fn two_pass<V: AsRef<[f64]>>(vectors: &[V], order: usize) -> (Vec<f64>, Vec<f64>) {
    let count = vectors.len() as f64;

    let mut mean = vec![0.0; order];
    for v in vectors {
        for (m, &x) in mean.iter_mut().zip(v.as_ref()) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= count;
    }

    let mut variance = vec![0.0; order];
    for v in vectors {
        for ((acc, &x), &m) in variance.iter_mut().zip(v.as_ref()).zip(&mean) {
            let diff = x - m;
            *acc += diff * diff;
        }
    }
    for acc in variance.iter_mut() {
        *acc /= count;
    }

    (mean, variance)
}

fn welford<V: AsRef<[f64]>>(vectors: &[V], order: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mean = vec![0.0; order];
    let mut m2 = vec![0.0; order];
    for (n, v) in vectors.iter().enumerate() {
        let n = (n + 1) as f64;
        for ((mu, acc), &x) in mean.iter_mut().zip(m2.iter_mut()).zip(v.as_ref()) {
            let delta = x - *mu;
            *mu += delta / n;
            *acc += delta * (x - *mu);
        }
    }
    let count = vectors.len() as f64;
    let variance = m2.into_iter().map(|acc| acc / count).collect();
    (mean, variance)
}

/// A trained set of class models plus the geometry they assume.
///
/// This is the top-level object saved to and loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    /// Sample rate the references were analyzed at.
    pub sample_rate: u32,
    /// Frame length in samples used during training.
    pub frame_size: usize,
    /// Cepstral order of every class.
    pub cepstral_order: usize,
    /// Models in label-index order.
    pub classes: Vec<ClassModel>,
}

impl ModelSet {
    /// Checks that the set is non-empty and every class has the declared order.
    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(EngineError::NoModels);
        }
        for class in &self.classes {
            class.validate()?;
            if class.order() != self.cepstral_order {
                return Err(EngineError::model_mismatch(format!(
                    "class '{}' has order {} in a set of order {}",
                    class.label(),
                    class.order(),
                    self.cepstral_order
                )));
            }
        }
        Ok(())
    }

    /// Class labels in index order.
    pub fn labels(&self) -> Vec<&str> {
        self.classes.iter().map(ClassModel::label).collect()
    }

    /// Serializes the set as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a JSON model set.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let set: ModelSet = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Saves the model set to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write models '{}'", path.display()))
    }

    /// Loads a model set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read models '{}'", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("invalid models in '{}'", path.display()))
    }
}
