//! XGBoost-style gradient boosting for binary classification
//!
//! - Uses both gradient and hessian of the logistic loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Row and column subsampling per tree from a seeded generator
//! - Training AUC recorded after every round (no early stopping)

use super::models::{check_fit_inputs, Classifier, ModelVariant, ProbabilityVector};
use crate::error::{Result, TrainerError};
use crate::evaluation::roc_auc;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 4,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 0.8,
            colsample_bytree: 0.8,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if self.n_estimators == 0 {
            return Err(TrainerError::Configuration("n_estimators must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(TrainerError::Configuration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !in_unit(self.subsample) || !in_unit(self.colsample_bytree) {
            return Err(TrainerError::Configuration(format!(
                "subsample ratios must be in (0, 1], got {} and {}",
                self.subsample, self.colsample_bytree
            )));
        }
        Ok(())
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &[f64]) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Find best split across features (parallelized)
    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64) -> f64 {
    -g_sum / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for one feature
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for (pos, &idx) in sorted_indices.iter().enumerate().take(sorted_indices.len() - 1) {
        g_left += grad[idx];
        h_left += hess[idx];

        let next_idx = sorted_indices[pos + 1];
        let (value, next_value) = (x[[idx, feature]], x[[next_idx, feature]]);
        // identical values cannot be separated
        if (value - next_value).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if best.map_or(true, |(_, best_gain)| gain > best_gain) {
            best = Some(((value + next_value) / 2.0, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

/// Gradient-boosted tree classifier (logistic loss, second-order steps)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    /// Training AUC after each boosting round
    pub eval_history: Vec<f64>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            eval_history: Vec::new(),
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Raw margin (log-odds) per row
    fn margin(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut raw = Array1::from_elem(x.nrows(), self.base_score);
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            for tree in &self.trees {
                raw[i] += self.config.learning_rate * tree.predict(&sample);
            }
        }
        raw
    }
}

impl Classifier for XGBoostClassifier {
    fn variant(&self) -> ModelVariant {
        ModelVariant::GradientBoosted
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_inputs(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        // base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let labels: Vec<u8> = y.iter().map(|&v| u8::from(v > 0.5)).collect();
        let track_auc = labels.iter().any(|&l| l == 1) && labels.iter().any(|&l| l == 0);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        self.trees.clear();
        self.eval_history.clear();

        for round in 0..self.config.n_estimators {
            // logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict(&row.to_vec());
            }
            self.trees.push(tree);

            if track_auc {
                let train_probs: Vec<f64> = raw_preds.iter().map(|&m| Self::sigmoid(m)).collect();
                let auc = roc_auc(&labels, &train_probs)?;
                self.eval_history.push(auc);
                if (round + 1) % 50 == 0 {
                    debug!(round = round + 1, train_auc = auc, "Boosting progress");
                }
            }
        }

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<ProbabilityVector> {
        if !self.is_fitted() {
            return Err(TrainerError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TrainerError::Shape {
                expected: format!("{} columns", self.n_features),
                actual: format!("{} columns", x.ncols()),
            });
        }
        ProbabilityVector::new(self.margin(x).mapv(Self::sigmoid))
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        let c = &self.config;
        let mut params = BTreeMap::new();
        params.insert("objective".to_string(), "binary:logistic".to_string());
        params.insert("eval_metric".to_string(), "auc".to_string());
        params.insert("n_estimators".to_string(), c.n_estimators.to_string());
        params.insert("max_depth".to_string(), c.max_depth.to_string());
        params.insert("learning_rate".to_string(), c.learning_rate.to_string());
        params.insert("subsample".to_string(), c.subsample.to_string());
        params.insert("colsample_bytree".to_string(), c.colsample_bytree.to_string());
        params.insert("reg_lambda".to_string(), c.reg_lambda.to_string());
        params.insert("random_state".to_string(), c.random_state.to_string());
        params
    }
}

/// Random subset of `0..n` of size `ceil(n * ratio)`, sorted
fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
