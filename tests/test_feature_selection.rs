//! Integration test: column policy and feature extraction

use outcome_trainer::data::{DataSource, FrameSource};
use outcome_trainer::error::TrainerError;
use outcome_trainer::preprocessing::{
    ColumnPolicy, ColumnRole, DecisionReason, FeatureSelector, DEFAULT_EXCLUDED_COLUMNS,
};
use polars::prelude::*;

fn school_frame() -> DataFrame {
    df!(
        "id" => &[1i64, 2, 3, 4],
        "student_id" => &[10i64, 11, 12, 13],
        "exam_label" => &["mid", "mid", "final", "final"],
        "attendance" => &[0.9, 0.7, 0.95, 0.4],
        "avg_score" => &[71i64, 55, 88, 40],
        "region" => &["n", "s", "n", "e"],
        "is_repeat" => &[false, true, false, true],
        "y" => &[1i64, 0, 1, 0]
    )
    .unwrap()
}

fn select(df: DataFrame, policy: ColumnPolicy) -> outcome_trainer::Result<outcome_trainer::preprocessing::SelectedData> {
    let raw = FrameSource::new(df).fetch()?;
    FeatureSelector::new(policy).select(&raw)
}

#[test]
fn test_only_numeric_non_denylisted_columns_kept() {
    let selected = select(school_frame(), ColumnPolicy::default()).unwrap();

    assert_eq!(selected.features.names(), ["attendance", "avg_score"]);
    for name in selected.features.names() {
        assert!(!DEFAULT_EXCLUDED_COLUMNS.contains(&name.as_str()));
    }
    assert_eq!(selected.x.dim(), (4, 2));
    assert_eq!(selected.x[[2, 1]], 88.0);
    assert_eq!(selected.y.values(), &[1, 0, 1, 0]);
}

#[test]
fn test_every_column_gets_a_decision() {
    let selected = select(school_frame(), ColumnPolicy::default()).unwrap();

    assert_eq!(selected.decision("y").unwrap().role, ColumnRole::Label);
    assert_eq!(selected.decision("student_id").unwrap().reason, DecisionReason::Denylisted);
    assert_eq!(selected.decision("is_repeat").unwrap().reason, DecisionReason::BooleanDtype);
    assert!(matches!(
        selected.decision("region").unwrap().reason,
        DecisionReason::NonNumericDtype(_)
    ));
    // denylisted but not in the frame
    assert_eq!(
        selected.decision("created_at").unwrap().reason,
        DecisionReason::DenylistedAbsent
    );
}

#[test]
fn test_declared_boolean_feature() {
    let policy = ColumnPolicy::default().with_role("is_repeat", ColumnRole::Feature);
    let selected = select(school_frame(), policy).unwrap();

    assert!(selected.features.contains("is_repeat"));
    assert_eq!(selected.x[[1, 2]], 1.0);
}

#[test]
fn test_declared_text_feature_is_schema_error() {
    let policy = ColumnPolicy::default().with_role("region", ColumnRole::Feature);
    let err = select(school_frame(), policy).unwrap_err();
    assert!(matches!(err, TrainerError::Schema(ref msg) if msg.contains("region")));
}

#[test]
fn test_denylisted_column_ignores_feature_role() {
    let policy = ColumnPolicy::default().with_role("id", ColumnRole::Feature);
    let selected = select(school_frame(), policy).unwrap();

    assert!(!selected.features.contains("id"));
    let decision = selected.decision("id").unwrap();
    assert_eq!(decision.role, ColumnRole::Excluded);
    assert_eq!(decision.reason, DecisionReason::Denylisted);
    assert_eq!(selected.features.names(), ["attendance", "avg_score"]);
}

#[test]
fn test_label_outside_zero_one() {
    let mut df = school_frame();
    df.with_column(Column::new("y".into(), &[1i64, 0, 2, 0])).unwrap();

    let err = select(df, ColumnPolicy::default()).unwrap_err();
    assert!(matches!(err, TrainerError::Schema(_)));
}

#[test]
fn test_no_numeric_features() {
    let df = df!(
        "id" => &[1i64, 2],
        "region" => &["n", "s"],
        "y" => &[0i64, 1]
    )
    .unwrap();

    let err = select(df, ColumnPolicy::default()).unwrap_err();
    assert!(matches!(err, TrainerError::Schema(_)));
}
