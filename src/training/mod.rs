//! Model training module
//!
//! - Stratified train/test splitting
//! - Class-balanced logistic regression (L-BFGS)
//! - XGBoost-style gradient-boosted trees
//! - A training engine that fits both on the same partition

mod engine;
mod models;
pub mod linear_models;
pub mod split;
pub mod xgboost;

pub use engine::{FitSummary, TrainEngine, TrainedPair};
pub use linear_models::{ClassWeight, LogisticConfig, LogisticRegression};
pub use models::{Classifier, ModelConfig, ModelVariant, ProbabilityVector, TrainedModel};
pub use split::{Partition, SplitResult, StratifiedSplitter};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
