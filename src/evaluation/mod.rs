//! Model evaluation module
//!
//! Rank-based ROC AUC and a thresholded classification report.

mod metrics;

pub use metrics::{roc_auc, ClassMetrics, ClassificationReport, EvaluationMetrics, Evaluator};
