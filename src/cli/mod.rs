//! Outcome trainer CLI module
//!
//! `train` runs the pipeline once; `inspect` prints a published model set.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{DataSource, FileSource, PostgresSource};
use crate::export::ArtifactStore;
use crate::pipeline::{Pipeline, PipelineConfig, RunReport};
use crate::preprocessing::ColumnRole;
use crate::training::ModelVariant;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "outcome-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and publish binary outcome classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the dataset, train both models and publish the artifacts
    Train {
        /// Read from a CSV or Parquet file instead of Postgres
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Source relation, e.g. public.ml_training_samples_v1
        #[arg(short, long)]
        relation: Option<String>,

        /// Directory for the model files and metadata
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Seed for the split and the boosted trees
        #[arg(long)]
        seed: Option<u64>,

        /// Version recorded in the metadata (e.g. v1.0.0)
        #[arg(long)]
        model_version: Option<String>,

        /// Fit the two models one after the other
        #[arg(long)]
        sequential: bool,
    },

    /// Print the metadata and model envelopes of a published model set
    Inspect {
        /// Directory holding metadata.json and the model files
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

// ─── Command implementations ───────────────────────────────────────────────────

pub struct TrainArgs {
    pub data: Option<PathBuf>,
    pub relation: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub model_version: Option<String>,
    pub sequential: bool,
}

/// Environment first, then CLI flags on top
pub fn resolve_config(args: &TrainArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(relation) = &args.relation {
        config = config.with_source_relation(relation.clone());
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(version) = &args.model_version {
        config = config.with_model_version(version.clone());
    }
    if args.sequential {
        config = config.with_parallel_training(false);
    }
    Ok(config)
}

pub fn cmd_train(args: TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = resolve_config(&args)?;
    let pipeline = Pipeline::new(config)?;

    let source: Box<dyn DataSource> = match &args.data {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(PostgresSource::from_config(pipeline.config())?),
    };
    step_ok(&format!("Source {}", source.describe().cyan()));

    let start = Instant::now();
    let report = pipeline.run(source.as_ref())?;
    step_ok(&format!("Run finished in {:.2?}", start.elapsed()));

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    section("Features");
    for decision in &report.decisions {
        let role = match decision.role {
            ColumnRole::Feature => ok("feature"),
            ColumnRole::Label => accent("label"),
            ColumnRole::Excluded => dim("excluded"),
        };
        println!("  {:<28} {:<10} {}", decision.column, role, muted(&format!("{:?}", decision.reason)));
    }

    section("Evaluation");
    kv("Train rows", &report.train_rows.to_string());
    kv("Test rows", &report.test_rows.to_string());
    kv("AUC logistic", &format!("{:.4}", report.metrics.auc_logistic));
    kv("AUC xgb", &format!("{:.4}", report.metrics.auc_xgb));
    println!(
        "  {:<16} {}",
        muted("AUC ensemble"),
        format!("{:.4}", report.metrics.auc_ensemble).white().bold()
    );
    println!();
    for line in report.metrics.report.to_string().lines() {
        println!("  {}", line);
    }

    section("Timings");
    for timing in &report.timings {
        kv(timing.stage, &format!("{:.3}s", timing.elapsed_secs));
    }

    section("Artifacts");
    kv("Version", &report.metadata.version);
    for path in [&report.artifacts.logistic, &report.artifacts.xgb, &report.artifacts.metadata] {
        step_ok(&path.display().to_string());
    }
    println!();
}

pub fn cmd_inspect(dir: Option<&Path>) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let dir = dir.map(Path::to_path_buf).unwrap_or(config.output_dir);
    let store = ArtifactStore::new(&dir);

    section("Model set");
    let metadata = store.load_metadata()?;
    kv("Directory", &dir.display().to_string());
    kv("Version", &metadata.version);
    kv("Features", &metadata.features.len().to_string());
    kv("AUC logistic", &format!("{:.4}", metadata.auc_logistic));
    kv("AUC xgb", &format!("{:.4}", metadata.auc_xgb));
    kv("AUC ensemble", &format!("{:.4}", metadata.auc_ensemble));

    section("Envelopes");
    for variant in [ModelVariant::Logistic, ModelVariant::GradientBoosted] {
        let envelope = store.load_envelope(variant)?;
        metadata.ensure_compatible(&envelope.features)?;
        println!(
            "  {:<10} {} {}",
            accent(variant.as_str()),
            format!("{} bytes", envelope.payload.len()).white(),
            dim(&format!("checksum {:016x}, model set {}", envelope.checksum, envelope.schema_version))
        );
    }

    section("Feature order");
    for (i, name) in metadata.features.iter().enumerate() {
        println!("  {:>3}  {}", muted(&i.to_string()), name);
    }
    println!();
    Ok(())
}
