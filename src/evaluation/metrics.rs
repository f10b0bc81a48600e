//! Evaluation metrics for binary classifiers

use crate::error::{Result, TrainerError};
use crate::preprocessing::LabelVector;
use crate::training::ProbabilityVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Area under the ROC curve from the Mann-Whitney rank-sum statistic.
///
/// Tied scores get the average of their ranks. Fails when only one class
/// is present or when the inputs differ in length.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(TrainerError::dimension_mismatch(
            "labels vs scores",
            y_true.len(),
            scores.len(),
        ));
    }

    check_binary_labels(y_true)?;

    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(TrainerError::DegenerateLabel(format!(
            "AUC needs both classes, got {} positives and {} negatives",
            n_pos, n_neg
        )));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, averaged over runs of equal scores
    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives_in_run = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        rank_sum_pos += avg_rank * positives_in_run as f64;
        start = end;
    }

    let (n_pos, n_neg) = (n_pos as f64, n_neg as f64);
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg))
}

fn check_binary_labels(y_true: &[u8]) -> Result<()> {
    match y_true.iter().find(|&&l| l > 1) {
        Some(label) => Err(TrainerError::Schema(format!(
            "labels must be 0 or 1, found {}",
            label
        ))),
        None => Ok(()),
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        }
    }
}

/// Per-class metrics at a fixed threshold, plus averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub threshold: f64,
    /// Index 0 is the negative class, index 1 the positive class
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Hard predictions are `p >= threshold`
    pub fn compute(y_true: &[u8], probabilities: &[f64], threshold: f64) -> Result<Self> {
        if y_true.len() != probabilities.len() {
            return Err(TrainerError::dimension_mismatch(
                "labels vs probabilities",
                y_true.len(),
                probabilities.len(),
            ));
        }
        check_binary_labels(y_true)?;

        // confusion[actual][predicted]
        let mut confusion = [[0usize; 2]; 2];
        for (&actual, &p) in y_true.iter().zip(probabilities) {
            let predicted = usize::from(p >= threshold);
            confusion[actual as usize][predicted] += 1;
        }

        let negative = ClassMetrics::from_counts(confusion[0][0], confusion[1][0], confusion[0][1]);
        let positive = ClassMetrics::from_counts(confusion[1][1], confusion[0][1], confusion[1][0]);

        let total = y_true.len();
        let accuracy = if total > 0 {
            (confusion[0][0] + confusion[1][1]) as f64 / total as f64
        } else {
            0.0
        };

        let classes = [negative, positive];
        let macro_avg = average(&classes, |_| 0.5, total);
        let weighted_avg = average(
            &classes,
            |m| if total > 0 { m.support as f64 / total as f64 } else { 0.0 },
            total,
        );

        Ok(Self {
            threshold,
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        })
    }

    pub fn support(&self) -> usize {
        self.classes[0].support + self.classes[1].support
    }
}

fn average(classes: &[ClassMetrics; 2], weight: impl Fn(&ClassMetrics) -> f64, support: usize) -> ClassMetrics {
    let mut avg = ClassMetrics {
        precision: 0.0,
        recall: 0.0,
        f1_score: 0.0,
        support,
    };
    for m in classes {
        let w = weight(m);
        avg.precision += w * m.precision;
        avg.recall += w * m.recall;
        avg.f1_score += w * m.f1_score;
    }
    avg
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1_score, m.support
            )
        };

        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        row(f, "0", &self.classes[0])?;
        row(f, "1", &self.classes[1])?;
        writeln!(f)?;
        writeln!(f, "{:>12} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support())?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Scores for one run on the test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub auc_logistic: f64,
    pub auc_xgb: f64,
    pub auc_ensemble: f64,
    /// Report on the ensemble's probabilities
    pub report: ClassificationReport,
}

/// Scores the test-set probabilities of both models and the ensemble
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Evaluator {
    threshold: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl Evaluator {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(
        &self,
        y_test: &LabelVector,
        p_logistic: &ProbabilityVector,
        p_xgb: &ProbabilityVector,
        p_ensemble: &ProbabilityVector,
    ) -> Result<EvaluationMetrics> {
        let labels = y_test.values();
        let score = |p: &ProbabilityVector| -> Result<f64> {
            let values = p.values().to_vec();
            roc_auc(labels, &values)
        };

        let auc_logistic = score(p_logistic)?;
        let auc_xgb = score(p_xgb)?;
        let auc_ensemble = score(p_ensemble)?;

        let ensemble_values = p_ensemble.values().to_vec();
        let report = ClassificationReport::compute(labels, &ensemble_values, self.threshold)?;

        Ok(EvaluationMetrics {
            auc_logistic,
            auc_xgb,
            auc_ensemble,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_known_value() {
        // sklearn.metrics.roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_auc_ties_count_half() {
        let auc = roc_auc(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);

        let auc = roc_auc(&[0, 1, 1], &[0.3, 0.3, 0.9]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_auc_invariant_under_monotone_transform() {
        let y = [0, 1, 0, 1, 1, 0, 0, 1];
        let p = [0.1, 0.7, 0.3, 0.4, 0.9, 0.45, 0.2, 0.6];
        let squashed: Vec<f64> = p.iter().map(|v| v * v).collect();
        assert_eq!(roc_auc(&y, &p).unwrap(), roc_auc(&y, &squashed).unwrap());
    }

    #[test]
    fn test_auc_single_class() {
        let err = roc_auc(&[1, 1, 1], &[0.2, 0.5, 0.9]).unwrap_err();
        assert!(matches!(err, TrainerError::DegenerateLabel(_)));
    }

    #[test]
    fn test_auc_length_mismatch() {
        let err = roc_auc(&[0, 1], &[0.2]).unwrap_err();
        assert!(matches!(err, TrainerError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_report_counts() {
        let y = [0, 0, 0, 1, 1];
        let p = [0.1, 0.6, 0.2, 0.5, 0.3];
        let report = ClassificationReport::compute(&y, &p, 0.5).unwrap();

        // predictions: 0, 1, 0, 1, 0
        assert_eq!(report.classes[1].support, 2);
        assert!((report.classes[1].precision - 0.5).abs() < 1e-12);
        assert!((report.classes[1].recall - 0.5).abs() < 1e-12);
        assert!((report.classes[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert_eq!(report.support(), 5);
    }

    #[test]
    fn test_non_binary_labels_rejected() {
        let err = ClassificationReport::compute(&[0, 2], &[0.1, 0.9], 0.5).unwrap_err();
        assert!(matches!(err, TrainerError::Schema(_)));
        assert!(matches!(roc_auc(&[0, 1, 2], &[0.1, 0.5, 0.9]), Err(TrainerError::Schema(_))));
    }

    #[test]
    fn test_report_zero_division() {
        let report = ClassificationReport::compute(&[0, 1, 0], &[0.1, 0.2, 0.3], 0.5).unwrap();
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1_score, 0.0);
        assert_eq!(report.macro_avg.recall, 0.5);
    }

    #[test]
    fn test_report_renders_table() {
        let report = ClassificationReport::compute(&[0, 1], &[0.2, 0.8], 0.5).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn test_evaluator_scores_all_three() {
        let y = LabelVector::new(vec![0, 1, 0, 1]).unwrap();
        let a = ProbabilityVector::from(vec![0.1, 0.9, 0.2, 0.8]);
        let b = ProbabilityVector::from(vec![0.6, 0.4, 0.3, 0.7]);
        let ens = ProbabilityVector::from(vec![0.35, 0.65, 0.25, 0.75]);

        let metrics = Evaluator::default().evaluate(&y, &a, &b, &ens).unwrap();
        assert_eq!(metrics.auc_logistic, 1.0);
        assert!((metrics.auc_xgb - 0.75).abs() < 1e-12);
        assert_eq!(metrics.auc_ensemble, 1.0);
        assert_eq!(metrics.report.accuracy, 1.0);
    }
}
