//! Column-role policy and numeric feature selection
//!
//! Each column of the raw table is assigned one role from a static
//! [`ColumnPolicy`]: the label, an excluded metadata column, or a feature.
//! Columns without an explicit role become features only when their declared
//! dtype is numeric. Every decision is logged and returned so callers can
//! audit why a column was kept or dropped.

use crate::data::RawDataset;
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Columns that identify rows or carry dates and free text
pub const DEFAULT_EXCLUDED_COLUMNS: &[&str] = &[
    "id",
    "student_id",
    "class_id",
    "institution_id",
    "academic_year",
    "exam_label",
    "exam_date",
    "created_at",
];

/// Role of a column in the training table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Label,
    Feature,
    Excluded,
}

/// Static table deciding the role of each column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPolicy {
    /// Name of the binary label column
    pub label: String,
    /// Columns dropped when present; absence is tolerated
    pub excluded: Vec<String>,
    /// Explicit roles that take precedence over dtype-based inclusion
    /// (but not over `excluded`)
    pub overrides: BTreeMap<String, ColumnRole>,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        Self {
            label: "y".to_string(),
            excluded: DEFAULT_EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            overrides: BTreeMap::new(),
        }
    }
}

impl ColumnPolicy {
    /// Declare a role for one column, e.g. to keep a boolean flag as a feature.
    /// Denylisted columns stay excluded whatever role is declared here.
    pub fn with_role(mut self, column: impl Into<String>, role: ColumnRole) -> Self {
        self.overrides.insert(column.into(), role);
        self
    }

    fn declared_role(&self, column: &str) -> Option<ColumnRole> {
        if column == self.label {
            return Some(ColumnRole::Label);
        }
        if self.excluded.iter().any(|c| c == column) {
            return Some(ColumnRole::Excluded);
        }
        self.overrides.get(column).copied()
    }
}

/// Why a column ended up with its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    Label,
    DeclaredFeature,
    DeclaredExcluded,
    /// Denylisted column that exists in the table
    Denylisted,
    /// Denylisted column that the table does not have
    DenylistedAbsent,
    NumericDtype,
    BooleanDtype,
    NonNumericDtype(String),
}

/// Outcome for one column name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDecision {
    pub column: String,
    pub role: ColumnRole,
    pub reason: DecisionReason,
}

/// Ordered feature names. The order is the column order of every matrix fed
/// to the models and is recorded verbatim in the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    names: Vec<String>,
}

impl FeatureSet {
    /// Build from names, dropping repeats while keeping first occurrence order
    pub fn new(names: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// Integer {0,1} labels aligned with the feature matrix rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVector {
    values: Vec<u8>,
}

impl LabelVector {
    /// Validate and wrap raw labels
    pub fn new(values: Vec<u8>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|&&v| v > 1) {
            return Err(TrainerError::Schema(format!(
                "label values must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn positives(&self) -> usize {
        self.values.iter().filter(|&&v| v == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Fraction of positive labels
    pub fn positive_rate(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.positives() as f64 / self.len() as f64
    }

    /// Labels as floats for the model fitting code
    pub fn to_f64(&self) -> Array1<f64> {
        self.values.iter().map(|&v| v as f64).collect()
    }

    /// Subset in the given row order
    pub fn select(&self, indices: &[usize]) -> LabelVector {
        LabelVector {
            values: indices.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

/// Output of feature selection
#[derive(Debug, Clone)]
pub struct SelectedData {
    pub features: FeatureSet,
    /// Row-major matrix, columns in `features` order
    pub x: Array2<f64>,
    pub y: LabelVector,
    pub decisions: Vec<ColumnDecision>,
}

impl SelectedData {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Decision recorded for a column, if any
    pub fn decision(&self, column: &str) -> Option<&ColumnDecision> {
        self.decisions.iter().find(|d| d.column == column)
    }
}

/// Derives the feature matrix and label vector from a raw table
#[derive(Debug, Clone, Default)]
pub struct FeatureSelector {
    policy: ColumnPolicy,
}

impl FeatureSelector {
    pub fn new(policy: ColumnPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ColumnPolicy {
        &self.policy
    }

    /// Select features and labels from the dataset
    pub fn select(&self, data: &RawDataset) -> Result<SelectedData> {
        let df = data.frame();
        let label_name = self.policy.label.as_str();

        let label_column = df.column(label_name).map_err(|_| {
            TrainerError::Schema(format!(
                "dataset must contain a '{}' column with 0/1 values",
                label_name
            ))
        })?;
        let y = extract_labels(label_column, label_name)?;

        let mut decisions = Vec::with_capacity(df.width() + self.policy.excluded.len());
        let mut feature_names = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            let decision = self.decide(name, column.dtype())?;
            match decision.role {
                ColumnRole::Feature => {
                    debug!(column = name, reason = ?decision.reason, "Keeping feature column");
                    feature_names.push(name.to_string());
                }
                ColumnRole::Excluded => match &decision.reason {
                    DecisionReason::BooleanDtype => {
                        info!(column = name, "Dropping boolean column (declare it a feature to keep it)")
                    }
                    _ => debug!(column = name, reason = ?decision.reason, "Dropping column"),
                },
                ColumnRole::Label => {}
            }
            decisions.push(decision);
        }

        for excluded in &self.policy.excluded {
            if df.column(excluded).is_err() {
                debug!(column = %excluded, "Denylisted column not present, nothing to drop");
                decisions.push(ColumnDecision {
                    column: excluded.clone(),
                    role: ColumnRole::Excluded,
                    reason: DecisionReason::DenylistedAbsent,
                });
            }
        }

        let features = FeatureSet::new(feature_names);
        if features.is_empty() {
            return Err(TrainerError::Schema(
                "no numeric feature columns remain after applying the column policy".to_string(),
            ));
        }

        let (x, n_nulls) = columns_to_array2(df, features.names())?;
        if n_nulls > 0 {
            warn!(cells = n_nulls, "Null feature cells imputed with 0.0");
        }

        info!(
            rows = x.nrows(),
            features = features.len(),
            positives = y.positives(),
            "Selected numeric features"
        );

        Ok(SelectedData {
            features,
            x,
            y,
            decisions,
        })
    }

    fn decide(&self, name: &str, dtype: &DataType) -> Result<ColumnDecision> {
        let (role, reason) = match self.policy.declared_role(name) {
            Some(ColumnRole::Label) => (ColumnRole::Label, DecisionReason::Label),
            Some(ColumnRole::Feature) => {
                if !is_numeric_dtype(dtype) && !matches!(dtype, DataType::Boolean) {
                    return Err(TrainerError::Schema(format!(
                        "column '{}' is declared a feature but has dtype {}; only numeric and boolean columns can be features",
                        name, dtype
                    )));
                }
                (ColumnRole::Feature, DecisionReason::DeclaredFeature)
            }
            Some(ColumnRole::Excluded) => {
                let reason = if self.policy.excluded.iter().any(|c| c == name) {
                    DecisionReason::Denylisted
                } else {
                    DecisionReason::DeclaredExcluded
                };
                (ColumnRole::Excluded, reason)
            }
            None if is_numeric_dtype(dtype) => (ColumnRole::Feature, DecisionReason::NumericDtype),
            None if matches!(dtype, DataType::Boolean) => {
                (ColumnRole::Excluded, DecisionReason::BooleanDtype)
            }
            None => (
                ColumnRole::Excluded,
                DecisionReason::NonNumericDtype(dtype.to_string()),
            ),
        };

        Ok(ColumnDecision {
            column: name.to_string(),
            role,
            reason,
        })
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn extract_labels(column: &Column, name: &str) -> Result<LabelVector> {
    let as_f64 = column.cast(&DataType::Float64).map_err(|e| {
        TrainerError::Schema(format!("label column '{}' is not numeric: {}", name, e))
    })?;

    let values = as_f64
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v == 0.0 => Ok(0u8),
            Some(v) if v == 1.0 => Ok(1u8),
            Some(v) => Err(TrainerError::Schema(format!(
                "label column '{}' holds {} at row {}; only 0 and 1 are allowed",
                name, v, row
            ))),
            None => Err(TrainerError::Schema(format!(
                "label column '{}' is null at row {}",
                name, row
            ))),
        })
        .collect::<Result<Vec<u8>>>()?;

    LabelVector::new(values)
}

/// Extract named columns into a row-major matrix. Returns the matrix and the
/// number of null cells that were filled with 0.0.
pub(crate) fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<(Array2<f64>, usize)> {
    let n_rows = df.height();
    let n_cols = col_names.len();
    let mut n_nulls = 0usize;

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| TrainerError::Schema(format!("feature column '{}' not found", col_name)))?;
            let as_f64 = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = as_f64
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(v) if v.is_finite() => v,
                    _ => {
                        n_nulls += 1;
                        0.0
                    }
                })
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    let x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]);
    Ok((x, n_nulls))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(frame: DataFrame) -> RawDataset {
        RawDataset::new(frame).unwrap()
    }

    fn sample_frame() -> DataFrame {
        df!(
            "id" => &[1i64, 2, 3, 4],
            "age" => &[21i64, 35, 42, 19],
            "score" => &[0.5, 1.5, 2.5, 3.5],
            "passed_before" => &[true, false, true, false],
            "exam_label" => &["a", "b", "c", "d"],
            "y" => &[0i64, 1, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_default_policy_selects_numeric_columns() {
        let selected = FeatureSelector::default().select(&raw(sample_frame())).unwrap();

        assert_eq!(selected.features.names(), &["age", "score"]);
        assert_eq!(selected.x.shape(), &[4, 2]);
        assert_eq!(selected.x[[2, 0]], 42.0);
        assert_eq!(selected.x[[2, 1]], 2.5);
        assert_eq!(selected.y.values(), &[0, 1, 1, 0]);
    }

    #[test]
    fn test_missing_label_is_schema_error() {
        let frame = df!("a" => &[1.0, 2.0]).unwrap();
        let err = FeatureSelector::default().select(&raw(frame)).unwrap_err();
        assert!(matches!(err, TrainerError::Schema(_)));
    }

    #[test]
    fn test_invalid_label_values() {
        let frame = df!("a" => &[1.0, 2.0, 3.0], "y" => &[0i64, 2, 1]).unwrap();
        let err = FeatureSelector::default().select(&raw(frame)).unwrap_err();
        assert!(matches!(err, TrainerError::Schema(_)));

        let frame = df!("a" => &[1.0, 2.0], "y" => &[Some(1i64), None]).unwrap();
        let err = FeatureSelector::default().select(&raw(frame)).unwrap_err();
        assert!(matches!(err, TrainerError::Schema(_)));
    }

    #[test]
    fn test_float_labels_are_coerced() {
        let frame = df!("a" => &[1.0, 2.0], "y" => &[1.0, 0.0]).unwrap();
        let selected = FeatureSelector::default().select(&raw(frame)).unwrap();
        assert_eq!(selected.y.values(), &[1, 0]);
    }

    #[test]
    fn test_decisions_are_recorded() {
        let selected = FeatureSelector::default().select(&raw(sample_frame())).unwrap();

        let id = selected.decision("id").unwrap();
        assert_eq!(id.role, ColumnRole::Excluded);
        assert_eq!(id.reason, DecisionReason::Denylisted);

        let flag = selected.decision("passed_before").unwrap();
        assert_eq!(flag.reason, DecisionReason::BooleanDtype);

        let text = selected.decision("exam_label").unwrap();
        assert_eq!(text.role, ColumnRole::Excluded);

        // denylisted but absent: tolerated and still reported
        let absent = selected.decision("student_id").unwrap();
        assert_eq!(absent.reason, DecisionReason::DenylistedAbsent);

        assert_eq!(selected.decision("y").unwrap().role, ColumnRole::Label);
    }

    #[test]
    fn test_declared_boolean_feature_is_kept() {
        let policy = ColumnPolicy::default().with_role("passed_before", ColumnRole::Feature);
        let selected = FeatureSelector::new(policy).select(&raw(sample_frame())).unwrap();

        assert_eq!(selected.features.names(), &["age", "score", "passed_before"]);
        assert_eq!(selected.x[[0, 2]], 1.0);
        assert_eq!(selected.x[[1, 2]], 0.0);
    }

    #[test]
    fn test_declared_exclusion_overrides_dtype() {
        let policy = ColumnPolicy::default().with_role("age", ColumnRole::Excluded);
        let selected = FeatureSelector::new(policy).select(&raw(sample_frame())).unwrap();

        assert_eq!(selected.features.names(), &["score"]);
        assert_eq!(
            selected.decision("age").unwrap().reason,
            DecisionReason::DeclaredExcluded
        );
    }

    #[test]
    fn test_no_features_left() {
        let frame = df!("id" => &[1i64, 2], "y" => &[0i64, 1]).unwrap();
        let err = FeatureSelector::default().select(&raw(frame)).unwrap_err();
        assert!(matches!(err, TrainerError::Schema(_)));
    }

    #[test]
    fn test_null_features_filled() {
        let frame = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "y" => &[0i64, 1, 0]
        )
        .unwrap();
        let selected = FeatureSelector::default().select(&raw(frame)).unwrap();
        assert_eq!(selected.x[[1, 0]], 0.0);
    }

    #[test]
    fn test_feature_set_dedup_and_labels() {
        let set = FeatureSet::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(set.names(), &["a", "b"]);
        assert!(set.contains("b"));

        let labels = LabelVector::new(vec![1, 0, 1, 1]).unwrap();
        assert_eq!(labels.positives(), 3);
        assert_eq!(labels.negatives(), 1);
        assert_eq!(labels.select(&[1, 3]).values(), &[0, 1]);
        assert!(LabelVector::new(vec![0, 3]).is_err());
    }
}
