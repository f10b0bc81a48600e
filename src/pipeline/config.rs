//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, TrainerError};
use crate::export::ModelVersion;
use crate::preprocessing::ColumnPolicy;
use crate::training::{LogisticConfig, XGBoostConfig};

pub const DEFAULT_SOURCE_RELATION: &str = "public.ml_training_samples_v1";
pub const DEFAULT_OUTPUT_DIR: &str = "models";
pub const DEFAULT_MODEL_VERSION: &str = "v1.0.0";

/// Everything a training run needs, resolved before any data is read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Postgres connection string; only needed for the database source
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub source_relation: String,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub test_fraction: f64,
    pub model_version: String,
    /// Fit the two models concurrently
    pub parallel_training: bool,
    pub policy: ColumnPolicy,
    pub logistic: LogisticConfig,
    pub xgboost: XGBoostConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            source_relation: DEFAULT_SOURCE_RELATION.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            seed: 42,
            test_fraction: 0.2,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            parallel_training: true,
            policy: ColumnPolicy::default(),
            logistic: LogisticConfig::default(),
            xgboost: XGBoostConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `DATABASE_URL` and the `TRAINER_*` variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if let Some(relation) = lookup("TRAINER_SOURCE_RELATION") {
            config.source_relation = relation;
        }
        if let Some(dir) = lookup("TRAINER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(seed) = lookup("TRAINER_SEED") {
            let seed = seed.trim().parse().map_err(|_| {
                TrainerError::Configuration(format!("TRAINER_SEED must be an unsigned integer, got {:?}", seed))
            })?;
            config = config.with_seed(seed);
        }
        if let Some(version) = lookup("TRAINER_MODEL_VERSION") {
            config.model_version = version;
        }

        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_source_relation(mut self, relation: impl Into<String>) -> Self {
        self.source_relation = relation.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Seeds both the splitter and the boosted trees
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.xgboost.random_state = seed;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_parallel_training(mut self, parallel: bool) -> Self {
        self.parallel_training = parallel;
        self
    }

    pub fn with_policy(mut self, policy: ColumnPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_xgboost(mut self, xgboost: XGBoostConfig) -> Self {
        self.xgboost = xgboost;
        self
    }

    pub fn with_logistic(mut self, logistic: LogisticConfig) -> Self {
        self.logistic = logistic;
        self
    }

    /// Check everything that can be checked without touching data
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainerError::Configuration(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.policy.label.trim().is_empty() {
            return Err(TrainerError::Configuration("label column name is empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(TrainerError::Configuration("output directory is empty".to_string()));
        }
        if self.logistic.c <= 0.0 {
            return Err(TrainerError::Configuration(format!(
                "logistic C must be positive, got {}",
                self.logistic.c
            )));
        }
        if self.xgboost.n_estimators == 0 {
            return Err(TrainerError::Configuration("n_estimators must be at least 1".to_string()));
        }
        ModelVersion::parse(&self.model_version)?;
        Ok(())
    }
}
