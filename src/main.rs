//! Outcome trainer - main entry point

use clap::Parser;
use outcome_trainer::cli::{cmd_inspect, cmd_train, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outcome_trainer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, relation, output_dir, seed, model_version, sequential } => {
            cmd_train(TrainArgs { data, relation, output_dir, seed, model_version, sequential })?;
        }
        Commands::Inspect { dir } => {
            cmd_inspect(dir.as_deref())?;
        }
    }

    Ok(())
}
