//! Error types for the outcome trainer

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type for the training pipeline.
///
/// Every variant is fatal at the pipeline level: nothing downstream tries to
/// recover from one.
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Dimension mismatch: {context} (left = {left}, right = {right})")]
    DimensionMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    #[error("Degenerate labels: {0}")]
    DegenerateLabel(String),

    #[error("Artifact write error: {0}")]
    ArtifactWrite(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl TrainerError {
    /// Shorthand for a length mismatch between two aligned vectors
    pub fn dimension_mismatch(context: impl Into<String>, left: usize, right: usize) -> Self {
        TrainerError::DimensionMismatch {
            context: context.into(),
            left,
            right,
        }
    }
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for TrainerError {
    fn from(err: bincode::Error) -> Self {
        TrainerError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainerError::Schema("column 'y' is missing".to_string());
        assert_eq!(err.to_string(), "Schema error: column 'y' is missing");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = TrainerError::dimension_mismatch("ensemble inputs", 3, 4);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: ensemble inputs (left = 3, right = 4)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TrainerError = io_err.into();
        assert!(matches!(err, TrainerError::Io(_)));
    }
}
