//! # Classification Module
//!
//! Scores a cepstral vector against every trained class and picks the class
//! with the highest log-likelihood. Classes are scanned in index order and a
//! later class must score strictly higher to win, so ties go to the lowest
//! index.

use crate::error::{EngineError, Result};
use crate::model::ClassModel;

/// Outcome of classifying one vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Index of the winning class.
    pub label: usize,
    /// Log-likelihood of every class, in class order.
    pub scores: Vec<f64>,
}

impl ClassificationResult {
    /// Score of the winning class.
    pub fn best_score(&self) -> f64 {
        self.scores[self.label]
    }
}

/// Index of the first maximum; NaN scores never win.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b || v.is_nan() => {}
            None if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Scores `x` against `models` and returns the best class.
///
/// # Returns
/// * `Err(EngineError::NoModels)` - `models` is empty
/// * `Err(EngineError::ModelMismatch)` - `x` does not match a model's order
pub fn classify(x: &[f64], models: &[ClassModel]) -> Result<ClassificationResult> {
    if models.is_empty() {
        return Err(EngineError::NoModels);
    }
    let scores = models
        .iter()
        .map(|model| model.log_likelihood(x))
        .collect::<Result<Vec<f64>>>()?;
    let label = argmax(&scores).ok_or_else(|| {
        EngineError::model_mismatch("every class scored NaN")
    })?;
    Ok(ClassificationResult { label, scores })
}

/// A validated, immutable set of class models.
#[derive(Debug, Clone)]
pub struct GaussianClassifier {
    models: Vec<ClassModel>,
    order: usize,
}

impl GaussianClassifier {
    /// Wraps trained models.
    ///
    /// # Returns
    /// * `Err(EngineError::NoModels)` - `models` is empty
    /// * `Err(EngineError::ModelMismatch)` - Models disagree on their order
    pub fn new(models: Vec<ClassModel>) -> Result<Self> {
        let order = models.first().ok_or(EngineError::NoModels)?.order();
        if let Some(odd) = models.iter().find(|m| m.order() != order) {
            return Err(EngineError::model_mismatch(format!(
                "class '{}' has order {}, expected {}",
                odd.label(),
                odd.order(),
                order
            )));
        }
        Ok(Self { models, order })
    }

    /// The models, in label-index order.
    pub fn models(&self) -> &[ClassModel] {
        &self.models
    }

    /// Cepstral order shared by every model.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Label string of class `index`.
    pub fn label_name(&self, index: usize) -> Option<&str> {
        self.models.get(index).map(ClassModel::label)
    }

    /// Classifies one cepstral vector.
    pub fn classify(&self, x: &[f64]) -> Result<ClassificationResult> {
        classify(x, &self.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(label: &str, mean: f64, std: f64, order: usize) -> ClassModel {
        ClassModel::new(label, vec![mean; order], vec![std; order]).unwrap()
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[f64::NAN, -1.0, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f64::NAN]), None);
    }

    #[test]
    fn vector_at_class_mean_selects_that_class() {
        let classifier = GaussianClassifier::new(vec![
            model("a", 0.0, 1.0, 13),
            model("i", 2.0, 1.0, 13),
            model("u", -3.0, 1.0, 13),
            model("e", 5.0, 1.0, 13),
            model("o", 9.0, 0.8, 13),
        ])
        .unwrap();
        for (index, class) in classifier.models().iter().enumerate() {
            let result = classifier.classify(class.mean()).unwrap();
            assert_eq!(result.label, index, "class {}", class.label());
            assert_eq!(result.scores.len(), 5);
        }
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let classifier = GaussianClassifier::new(vec![
            model("first", 1.0, 1.0, 3),
            model("second", 1.0, 1.0, 3),
        ])
        .unwrap();
        let result = classifier.classify(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(result.label, 0);
        assert_eq!(result.scores[0], result.scores[1]);
    }

    #[test]
    fn score_is_higher_for_closer_class() {
        let result = classify(&[0.2, -0.1], &[model("near", 0.0, 1.0, 2), model("far", 5.0, 1.0, 2)])
            .unwrap();
        assert_eq!(result.label, 0);
        assert!(result.best_score() > result.scores[1]);
    }

    #[test]
    fn empty_and_mismatched_model_sets_fail() {
        assert!(matches!(classify(&[0.0], &[]), Err(EngineError::NoModels)));
        assert!(matches!(GaussianClassifier::new(vec![]), Err(EngineError::NoModels)));
        assert!(matches!(
            GaussianClassifier::new(vec![model("a", 0.0, 1.0, 2), model("b", 0.0, 1.0, 3)]),
            Err(EngineError::ModelMismatch(_))
        ));
        let classifier = GaussianClassifier::new(vec![model("a", 0.0, 1.0, 2)]).unwrap();
        assert!(classifier.classify(&[0.0; 3]).is_err());
        assert_eq!(classifier.label_name(0), Some("a"));
        assert_eq!(classifier.label_name(1), None);
    }
}
