//! Classifier capability and fitted model state

use super::linear_models::{LogisticConfig, LogisticRegression};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    Logistic,
    GradientBoosted,
}

impl ModelVariant {
    /// Short name used in file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Logistic => "logistic",
            ModelVariant::GradientBoosted => "xgb",
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability of the positive class, one entry per scored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityVector(Array1<f64>);

impl ProbabilityVector {
    /// Wrap probabilities, rejecting values outside [0, 1] or NaN
    pub fn new(values: Array1<f64>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(TrainerError::Training(format!(
                "probability {} is outside [0, 1]",
                bad
            )));
        }
        Ok(Self(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.0
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }
}

impl From<Vec<f64>> for ProbabilityVector {
    fn from(values: Vec<f64>) -> Self {
        Self(Array1::from_vec(values))
    }
}

/// What the ensembling and evaluation stages need from a model
pub trait Classifier: Send + Sync {
    fn variant(&self) -> ModelVariant;

    /// Fit on a row-major feature matrix and 0/1 labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// P(y = 1) for every row of `x`
    fn predict_proba(&self, x: &Array2<f64>) -> Result<ProbabilityVector>;

    /// Training hyperparameters, rendered for metadata and logs
    fn hyperparameters(&self) -> BTreeMap<String, String>;
}

/// Hyperparameters for one variant, before fitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelConfig {
    Logistic(LogisticConfig),
    GradientBoosted(XGBoostConfig),
}

impl ModelConfig {
    pub fn variant(&self) -> ModelVariant {
        match self {
            ModelConfig::Logistic(_) => ModelVariant::Logistic,
            ModelConfig::GradientBoosted(_) => ModelVariant::GradientBoosted,
        }
    }

    /// Unfitted model for this configuration
    pub fn build(&self) -> TrainedModel {
        match self {
            ModelConfig::Logistic(cfg) => TrainedModel::Logistic(LogisticRegression::new(cfg.clone())),
            ModelConfig::GradientBoosted(cfg) => {
                TrainedModel::GradientBoosted(XGBoostClassifier::new(cfg.clone()))
            }
        }
    }
}

/// Fitted state of one classifier, tagged with its variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Logistic(LogisticRegression),
    GradientBoosted(XGBoostClassifier),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::Logistic(m) => m,
            TrainedModel::GradientBoosted(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::Logistic(m) => m,
            TrainedModel::GradientBoosted(m) => m,
        }
    }
}

impl Classifier for TrainedModel {
    fn variant(&self) -> ModelVariant {
        self.inner().variant()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<ProbabilityVector> {
        self.inner().predict_proba(x)
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        self.inner().hyperparameters()
    }
}

/// Check the usual preconditions shared by every `fit`
pub(crate) fn check_fit_inputs(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TrainerError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(TrainerError::Training("cannot fit on zero rows".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_probability_vector_bounds() {
        assert!(ProbabilityVector::new(array![0.0, 0.5, 1.0]).is_ok());
        assert!(ProbabilityVector::new(array![0.2, 1.2]).is_err());
        assert!(ProbabilityVector::new(array![f64::NAN]).is_err());
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(ModelVariant::Logistic.as_str(), "logistic");
        assert_eq!(ModelVariant::GradientBoosted.to_string(), "xgb");
    }

    #[test]
    fn test_config_builds_matching_variant() {
        let logistic = ModelConfig::Logistic(LogisticConfig::default());
        let boosted = ModelConfig::GradientBoosted(XGBoostConfig::default());

        assert_eq!(logistic.build().variant(), ModelVariant::Logistic);
        assert_eq!(boosted.build().variant(), ModelVariant::GradientBoosted);
    }

    #[test]
    fn test_unfitted_model_refuses_prediction() {
        let model = ModelConfig::Logistic(LogisticConfig::default()).build();
        let err = model.predict_proba(&array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, TrainerError::ModelNotFitted));
    }
}
