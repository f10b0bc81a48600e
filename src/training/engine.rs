//! Training engine: fits the logistic and boosted models on one partition

use super::linear_models::LogisticConfig;
use super::models::{Classifier, ModelConfig, ModelVariant, TrainedModel};
use super::split::Partition;
use super::xgboost::XGBoostConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Per-model record of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub variant: ModelVariant,
    pub training_time_secs: f64,
    pub hyperparameters: BTreeMap<String, String>,
}

/// Both fitted classifiers from one run
#[derive(Debug, Clone)]
pub struct TrainedPair {
    pub logistic: TrainedModel,
    pub gradient_boosted: TrainedModel,
    pub history: Vec<FitSummary>,
}

/// Fits the two model families on the training partition
#[derive(Debug, Clone)]
pub struct TrainEngine {
    logistic: ModelConfig,
    gradient_boosted: ModelConfig,
    parallel: bool,
}

impl Default for TrainEngine {
    fn default() -> Self {
        Self::new(LogisticConfig::default(), XGBoostConfig::default())
    }
}

impl TrainEngine {
    pub fn new(logistic: LogisticConfig, gradient_boosted: XGBoostConfig) -> Self {
        Self {
            logistic: ModelConfig::Logistic(logistic),
            gradient_boosted: ModelConfig::GradientBoosted(gradient_boosted),
            parallel: true,
        }
    }

    /// Fit the two models on separate threads (default) or one after another
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fit both models. Neither model sees any test row.
    pub fn train(&self, train: &Partition) -> Result<TrainedPair> {
        let (logistic, gradient_boosted) = if self.parallel {
            rayon::join(
                || fit_one(&self.logistic, train),
                || fit_one(&self.gradient_boosted, train),
            )
        } else {
            (
                fit_one(&self.logistic, train),
                fit_one(&self.gradient_boosted, train),
            )
        };

        let (logistic, logistic_summary) = logistic?;
        let (gradient_boosted, boosted_summary) = gradient_boosted?;

        Ok(TrainedPair {
            logistic,
            gradient_boosted,
            history: vec![logistic_summary, boosted_summary],
        })
    }
}

fn fit_one(config: &ModelConfig, train: &Partition) -> Result<(TrainedModel, FitSummary)> {
    let start = Instant::now();
    let mut model = config.build();
    model.fit(&train.x, &train.y.to_f64())?;

    let summary = FitSummary {
        variant: model.variant(),
        training_time_secs: start.elapsed().as_secs_f64(),
        hyperparameters: model.hyperparameters(),
    };
    info!(
        model = %summary.variant,
        rows = train.len(),
        elapsed_secs = summary.training_time_secs,
        "Model fitted"
    );
    Ok((model, summary))
}
