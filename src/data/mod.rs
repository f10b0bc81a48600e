//! Data ingestion
//!
//! A [`DataSource`] performs one read of the labeled dataset and hands back a
//! [`RawDataset`]. Nothing here keeps a connection open past `fetch`.

mod loader;
mod postgres;

pub use loader::FileSource;
pub use postgres::{ColumnKind, PostgresSource, RelationName};

use crate::error::{Result, TrainerError};
use polars::prelude::*;

/// The labeled table as fetched from a source, before any column filtering
#[derive(Debug, Clone)]
pub struct RawDataset {
    frame: DataFrame,
}

impl RawDataset {
    /// Wrap a frame. Rejects frames without rows.
    pub fn new(frame: DataFrame) -> Result<Self> {
        if frame.height() == 0 {
            return Err(TrainerError::InsufficientData(
                "dataset contains no rows".to_string(),
            ));
        }
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_columns(&self) -> usize {
        self.frame.width()
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}

/// A single-shot reader of the training dataset
pub trait DataSource {
    /// Human readable description used in logs
    fn describe(&self) -> String;

    /// Execute the read. Failures abort the run; there is no retry.
    fn fetch(&self) -> Result<RawDataset>;
}

/// Source over a frame that is already in memory
#[derive(Debug, Clone)]
pub struct FrameSource {
    frame: DataFrame,
}

impl FrameSource {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl DataSource for FrameSource {
    fn describe(&self) -> String {
        format!(
            "in-memory frame ({} rows x {} cols)",
            self.frame.height(),
            self.frame.width()
        )
    }

    fn fetch(&self) -> Result<RawDataset> {
        RawDataset::new(self.frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_rejected() {
        let frame = DataFrame::new(vec![
            Column::new("x".into(), Vec::<f64>::new()),
            Column::new("y".into(), Vec::<i64>::new()),
        ])
        .unwrap();

        let err = FrameSource::new(frame).fetch().unwrap_err();
        assert!(matches!(err, TrainerError::InsufficientData(_)));
    }

    #[test]
    fn test_frame_source_roundtrip() {
        let frame = df!(
            "x" => &[1.0, 2.0, 3.0],
            "y" => &[0i64, 1, 0]
        )
        .unwrap();

        let source = FrameSource::new(frame);
        let raw = source.fetch().unwrap();
        assert_eq!(raw.n_rows(), 3);
        assert_eq!(raw.column_names(), vec!["x", "y"]);
        assert!(raw.has_column("y"));
        assert!(!raw.has_column("id"));
        assert!(source.describe().contains("3 rows"));
    }
}
