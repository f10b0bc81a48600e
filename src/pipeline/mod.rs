//! End-to-end training pipeline
//!
//! fetch -> select -> split -> train -> ensemble -> evaluate -> publish.
//! Every stage error aborts the run before anything is written.

mod config;

pub use config::{PipelineConfig, DEFAULT_MODEL_VERSION, DEFAULT_OUTPUT_DIR, DEFAULT_SOURCE_RELATION};

use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::data::DataSource;
use crate::ensemble::Ensembler;
use crate::error::Result;
use crate::evaluation::{EvaluationMetrics, Evaluator};
use crate::export::{ArtifactStore, ModelMetadata, PublishedArtifacts};
use crate::preprocessing::{ColumnDecision, FeatureSelector};
use crate::training::{Classifier, FitSummary, StratifiedSplitter, TrainEngine, XGBoostConfig};

/// Wall-clock time of one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed_secs: f64,
}

/// Run-scoped state threaded through the stages
#[derive(Debug)]
pub struct PipelineContext {
    config: PipelineConfig,
    timings: Vec<StageTiming>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            timings: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Run `f` as the named stage, recording its duration
    pub fn stage<T>(&mut self, stage: &'static str, f: impl FnOnce(&PipelineConfig) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f(&self.config);
        let elapsed_secs = start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => info!(stage, elapsed_secs, "Stage complete"),
            Err(e) => warn!(stage, elapsed_secs, error = %e, "Stage failed"),
        }
        self.timings.push(StageTiming { stage, elapsed_secs });
        result
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub metadata: ModelMetadata,
    pub metrics: EvaluationMetrics,
    pub decisions: Vec<ColumnDecision>,
    pub artifacts: PublishedArtifacts,
    pub train_rows: usize,
    pub test_rows: usize,
    pub fits: Vec<FitSummary>,
    pub timings: Vec<StageTiming>,
}

/// Batch training pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Fails with a configuration error before any I/O
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, source: &dyn DataSource) -> Result<RunReport> {
        let mut ctx = PipelineContext::new(self.config.clone());
        info!(source = %source.describe(), output_dir = %self.config.output_dir.display(), "Starting training run");

        let raw = ctx.stage("fetch", |_| source.fetch())?;
        info!(rows = raw.n_rows(), columns = raw.n_columns(), "Dataset loaded");

        let selected = ctx.stage("select", |cfg| FeatureSelector::new(cfg.policy.clone()).select(&raw))?;
        drop(raw);
        info!(
            features = selected.features.len(),
            positives = selected.y.positives(),
            negatives = selected.y.negatives(),
            "Features selected"
        );

        let split = ctx.stage("split", |cfg| {
            StratifiedSplitter::new(cfg.test_fraction, cfg.seed)?.split(&selected.x, &selected.y)
        })?;

        let trained = ctx.stage("train", |cfg| {
            let xgboost = XGBoostConfig {
                random_state: cfg.seed,
                ..cfg.xgboost.clone()
            };
            TrainEngine::new(cfg.logistic.clone(), xgboost)
                .with_parallel(cfg.parallel_training)
                .train(&split.train)
        })?;

        let (p_logistic, p_xgb, p_ensemble) = ctx.stage("predict", |_| {
            let p_logistic = trained.logistic.predict_proba(&split.test.x)?;
            let p_xgb = trained.gradient_boosted.predict_proba(&split.test.x)?;
            let p_ensemble = Ensembler::default().combine(&p_logistic, &p_xgb)?;
            Ok((p_logistic, p_xgb, p_ensemble))
        })?;

        let metrics = ctx.stage("evaluate", |_| {
            Evaluator::default().evaluate(&split.test.y, &p_logistic, &p_xgb, &p_ensemble)
        })?;
        info!(
            auc_logistic = metrics.auc_logistic,
            auc_xgb = metrics.auc_xgb,
            auc_ensemble = metrics.auc_ensemble,
            "Evaluation complete"
        );

        let metadata = ModelMetadata::new(self.config.model_version.clone(), &selected.features, &metrics)?;
        let artifacts = ctx.stage("publish", |cfg| {
            ArtifactStore::new(&cfg.output_dir).publish(&trained.logistic, &trained.gradient_boosted, &metadata)
        })?;

        Ok(RunReport {
            metadata,
            metrics,
            decisions: selected.decisions,
            artifacts,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            fits: trained.history,
            timings: ctx.timings,
        })
    }
}
