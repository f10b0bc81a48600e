//! Data preprocessing module
//!
//! Decides which columns become features, extracts the label and
//! converts the selected columns into a dense matrix.

pub mod feature_selection;

pub use feature_selection::{
    ColumnDecision, ColumnPolicy, ColumnRole, DecisionReason, FeatureSelector, FeatureSet,
    LabelVector, SelectedData, DEFAULT_EXCLUDED_COLUMNS,
};
