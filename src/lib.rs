//! Outcome trainer - binary outcome classifiers from a labeled table
//!
//! Reads one labeled dataset, selects numeric features, makes a stratified
//! train/test split, fits a class-balanced logistic regression and a
//! gradient-boosted tree model, averages their probabilities, evaluates all
//! three on the held-out rows and publishes the models with version metadata.
//!
//! # Modules
//!
//! - [`data`] - Postgres, file and in-memory data sources
//! - [`preprocessing`] - Column policy, feature selection, label extraction
//! - [`training`] - Stratified split, logistic regression, boosted trees
//! - [`ensemble`] - Soft-voting combination of probabilities
//! - [`evaluation`] - ROC AUC and classification report
//! - [`export`] - Model envelopes, metadata and the artifact store
//! - [`pipeline`] - Configuration and end-to-end orchestration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Pipeline stages
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod ensemble;
pub mod evaluation;
pub mod export;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TrainerError};

    // Data
    pub use crate::data::{DataSource, FileSource, FrameSource, PostgresSource, RawDataset};

    // Preprocessing
    pub use crate::preprocessing::{ColumnPolicy, ColumnRole, FeatureSelector, FeatureSet, LabelVector};

    // Training
    pub use crate::training::{
        Classifier, LogisticConfig, LogisticRegression, ModelVariant, ProbabilityVector,
        StratifiedSplitter, TrainEngine, TrainedModel, XGBoostClassifier, XGBoostConfig,
    };

    // Ensemble and evaluation
    pub use crate::ensemble::Ensembler;
    pub use crate::evaluation::{roc_auc, ClassificationReport, EvaluationMetrics, Evaluator};

    // Export
    pub use crate::export::{ArtifactStore, ModelEnvelope, ModelMetadata, ModelVersion};

    // Pipeline
    pub use crate::pipeline::{Pipeline, PipelineConfig, RunReport};
}
