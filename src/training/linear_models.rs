//! Logistic regression for binary classification
//!
//! L2-regularised, optionally class-balanced, fitted with L-BFGS and an
//! Armijo backtracking line search. The objective is
//!
//! `(1/S) * sum_i s_i * logloss_i + ||w||^2 / (2 * C * S)`, `S = sum_i s_i`
//!
//! where `s_i` is the class weight of row `i`. The intercept is not penalised.

use super::models::{check_fit_inputs, Classifier, ModelVariant, ProbabilityVector};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

/// Per-class loss weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    /// Every row weighs 1
    Uniform,
    /// `n_samples / (2 * n_class)` for each class
    Balanced,
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Inverse L2 regularisation strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the largest absolute gradient component is below this
    pub tol: f64,
    /// Number of correction pairs kept by L-BFGS
    pub memory: usize,
    pub class_weight: ClassWeight,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            memory: 10,
            class_weight: ClassWeight::Balanced,
        }
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub config: LogisticConfig,
    /// Fitted coefficients, one per feature
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Weights applied to class 0 and class 1
    pub class_weights: Option<[f64; 2]>,
    /// Iterations used by the optimiser
    pub n_iter: usize,
    pub converged: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: None,
            class_weights: None,
            n_iter: 0,
            converged: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Numerically stable logistic function
    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let e = z.exp();
            e / (1.0 + e)
        }
    }

    /// `log(1 + exp(z))` without overflow
    fn softplus(z: f64) -> f64 {
        if z > 0.0 {
            z + (-z).exp().ln_1p()
        } else {
            z.exp().ln_1p()
        }
    }

    fn compute_class_weights(&self, y: &Array1<f64>) -> Result<[f64; 2]> {
        let n = y.len() as f64;
        let n_pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
        let n_neg = n - n_pos;

        match self.config.class_weight {
            ClassWeight::Uniform => Ok([1.0, 1.0]),
            ClassWeight::Balanced => {
                if n_pos == 0.0 || n_neg == 0.0 {
                    return Err(TrainerError::Training(
                        "balanced class weights need both classes in the training data".to_string(),
                    ));
                }
                Ok([n / (2.0 * n_neg), n / (2.0 * n_pos)])
            }
        }
    }

    /// Loss and gradient at `theta` (coefficients followed by the intercept)
    fn objective(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &Array1<f64>,
        weight_sum: f64,
        theta: &Array1<f64>,
    ) -> (f64, Array1<f64>) {
        let n_features = x.ncols();
        let w = theta.slice(ndarray::s![..n_features]);
        let b = theta[n_features];

        let z = x.dot(&w) + b;

        let mut loss = 0.0;
        let mut residual = Array1::zeros(z.len());
        Zip::from(&mut residual)
            .and(&z)
            .and(y)
            .and(sample_weight)
            .for_each(|r, &zi, &yi, &si| {
                loss += si * (Self::softplus(zi) - yi * zi);
                *r = si * (Self::sigmoid(zi) - yi);
            });

        let penalty = 1.0 / (self.config.c * weight_sum);
        loss = loss / weight_sum + 0.5 * penalty * w.dot(&w);

        let mut grad = Array1::zeros(n_features + 1);
        let grad_w = x.t().dot(&residual) / weight_sum + &(&w * penalty);
        grad.slice_mut(ndarray::s![..n_features]).assign(&grad_w);
        grad[n_features] = residual.sum() / weight_sum;

        (loss, grad)
    }

    /// Fit with L-BFGS
    fn fit_lbfgs(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_params = x.ncols() + 1;
        let class_weights = self.compute_class_weights(y)?;
        let sample_weight: Array1<f64> = y.mapv(|v| if v > 0.5 { class_weights[1] } else { class_weights[0] });
        let weight_sum = sample_weight.sum();

        let mut theta = Array1::<f64>::zeros(n_params);
        let (mut loss, mut grad) = self.objective(x, y, &sample_weight, weight_sum, &theta);

        let memory = self.config.memory.max(1);
        let mut history: VecDeque<(Array1<f64>, Array1<f64>, f64)> = VecDeque::with_capacity(memory);
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..self.config.max_iter {
            if max_abs(&grad) <= self.config.tol {
                converged = true;
                break;
            }
            n_iter = iter + 1;

            // two-loop recursion
            let mut q = grad.clone();
            let mut alphas = Vec::with_capacity(history.len());
            for (s, yv, rho) in history.iter().rev() {
                let alpha = rho * s.dot(&q);
                q.scaled_add(-alpha, yv);
                alphas.push(alpha);
            }
            let gamma = match history.back() {
                Some((s, yv, _)) => s.dot(yv) / yv.dot(yv),
                None => 1.0 / grad.dot(&grad).sqrt().max(1.0),
            };
            let mut direction = q * gamma;
            for ((s, yv, rho), alpha) in history.iter().zip(alphas.iter().rev()) {
                let beta = rho * yv.dot(&direction);
                direction.scaled_add(alpha - beta, s);
            }
            direction.mapv_inplace(|v| -v);

            let mut slope = direction.dot(&grad);
            if !(slope < 0.0) {
                // not a descent direction; restart from steepest descent
                history.clear();
                direction = grad.mapv(|g| -g);
                slope = direction.dot(&grad);
            }

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..60 {
                let candidate = &theta + &(&direction * step);
                let (cand_loss, cand_grad) = self.objective(x, y, &sample_weight, weight_sum, &candidate);
                if cand_loss.is_finite() && cand_loss <= loss + 1e-4 * step * slope {
                    accepted = Some((candidate, cand_loss, cand_grad));
                    break;
                }
                step *= 0.5;
            }

            let Some((next_theta, next_loss, next_grad)) = accepted else {
                debug!(iteration = iter, "Line search made no progress, stopping");
                converged = max_abs(&grad) <= self.config.tol * 10.0;
                break;
            };

            let s = &next_theta - &theta;
            let yv = &next_grad - &grad;
            let sy = s.dot(&yv);
            if sy > 1e-10 {
                if history.len() == memory {
                    history.pop_front();
                }
                history.push_back((s, yv, 1.0 / sy));
            }

            theta = next_theta;
            loss = next_loss;
            grad = next_grad;
        }

        if !converged && max_abs(&grad) <= self.config.tol {
            converged = true;
        }
        if !converged {
            warn!(
                max_iter = self.config.max_iter,
                gradient = max_abs(&grad),
                "Logistic regression did not converge; using last iterate"
            );
        }

        let n_features = x.ncols();
        self.coefficients = Some(theta.slice(ndarray::s![..n_features]).to_owned());
        self.intercept = Some(theta[n_features]);
        self.class_weights = Some(class_weights);
        self.n_iter = n_iter;
        self.converged = converged;

        debug!(iterations = n_iter, loss, converged, "Logistic regression fitted");
        Ok(())
    }
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

impl Classifier for LogisticRegression {
    fn variant(&self) -> ModelVariant {
        ModelVariant::Logistic
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_inputs(x, y)?;
        if self.config.c <= 0.0 {
            return Err(TrainerError::Configuration(format!(
                "C must be positive, got {}",
                self.config.c
            )));
        }
        self.fit_lbfgs(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<ProbabilityVector> {
        let coefficients = self.coefficients.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(TrainerError::Shape {
                expected: format!("{} columns", coefficients.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let intercept = self.intercept.unwrap_or(0.0);
        let linear = x.dot(coefficients) + intercept;
        ProbabilityVector::new(linear.mapv(Self::sigmoid))
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("solver".to_string(), "lbfgs".to_string());
        params.insert("C".to_string(), self.config.c.to_string());
        params.insert("max_iter".to_string(), self.config.max_iter.to_string());
        params.insert("tol".to_string(), self.config.tol.to_string());
        params.insert(
            "class_weight".to_string(),
            match self.config.class_weight {
                ClassWeight::Uniform => "none".to_string(),
                ClassWeight::Balanced => "balanced".to_string(),
            },
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [2.5, 1.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
            [4.5, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression_fits() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        assert!(model.is_fitted());
        let proba = model.predict_proba(&x).unwrap();
        for (p, label) in proba.values().iter().zip(y.iter()) {
            if *label > 0.5 {
                assert!(*p > 0.5, "positive row scored {}", p);
            } else {
                assert!(*p < 0.5, "negative row scored {}", p);
            }
        }
    }

    #[test]
    fn test_converges_within_budget() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert!(model.converged);
        assert!(model.n_iter < model.config.max_iter);
    }

    fn uniform_model() -> LogisticRegression {
        LogisticRegression::new(LogisticConfig {
            class_weight: ClassWeight::Uniform,
            ..Default::default()
        })
    }

    #[test]
    fn test_iteration_cap_returns_unconverged_model() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new(LogisticConfig {
            max_iter: 1,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert!(!model.converged);
        assert_eq!(model.n_iter, 1);
        assert!(model.predict_proba(&x).is_ok());
    }

    #[test]
    fn test_balanced_weights() {
        let y = array![0.0, 0.0, 0.0, 1.0];
        let model = LogisticRegression::default();
        let w = model.compute_class_weights(&y).unwrap();
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);

        let uniform = uniform_model();
        assert_eq!(uniform.compute_class_weights(&y).unwrap(), [1.0, 1.0]);
    }

    #[test]
    fn test_balancing_lifts_minority_scores() {
        // one informative feature, heavy imbalance
        let n = 200;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| (i % 10) as f64 / 10.0);
        let y: Array1<f64> = (0..n).map(|i| if i % 10 == 9 && i % 20 == 19 { 1.0 } else { 0.0 }).collect();

        let mut balanced = LogisticRegression::default();
        balanced.fit(&x, &y).unwrap();
        let mut plain = uniform_model();
        plain.fit(&x, &y).unwrap();

        let mean_balanced = balanced.predict_proba(&x).unwrap().values().mean().unwrap();
        let mean_plain = plain.predict_proba(&x).unwrap().values().mean().unwrap();
        assert!(mean_balanced > mean_plain);
    }

    #[test]
    fn test_deterministic_fit() {
        let (x, y) = separable();
        let mut a = LogisticRegression::default();
        let mut b = LogisticRegression::default();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.coefficients, b.coefficients);
        assert_eq!(a.intercept, b.intercept);
    }

    #[test]
    fn test_predict_shape_checked() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert!(model.predict_proba(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_single_class_rejected_when_balanced() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let err = LogisticRegression::default().fit(&x, &y).unwrap_err();
        assert!(matches!(err, TrainerError::Training(_)));
    }

    #[test]
    fn test_hyperparameters_reported() {
        let params = LogisticRegression::default().hyperparameters();
        assert_eq!(params["solver"], "lbfgs");
        assert_eq!(params["max_iter"], "1000");
        assert_eq!(params["class_weight"], "balanced");
    }
}
