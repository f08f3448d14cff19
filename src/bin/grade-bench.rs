//! Affinity regression benchmarks: run experiment plans and score
//! unlabeled descriptor tables with persisted models.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grade_affinity::experiment::{driver, ExperimentPlan};
use grade_affinity::model::ModelType;
use grade_affinity::session::Session;
use grade_affinity::table::{format_float, write_csv, ColumnData, ColumnarTable, DataColumns};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grade-bench")]
#[command(version, about = "Binding-affinity regression benchmarks on interaction descriptors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every combination of an experiment plan
    Run {
        /// Plan (JSON)
        #[arg(long)]
        plan: PathBuf,
    },
    /// Predict an unlabeled descriptor table with a persisted model
    Score {
        /// Descriptor CSV
        #[arg(long)]
        features: PathBuf,
        /// Directory holding the model artifacts
        #[arg(long)]
        model_dir: PathBuf,
        /// Regressor, e.g. `linearRegression`, `Ridge`, `XGBoost`
        #[arg(long)]
        model: String,
        /// Target score the model was trained on
        #[arg(long)]
        score: String,
        /// Data subset tag the model was trained on
        #[arg(long)]
        data: String,
        /// Ablation tag the model was trained with
        #[arg(long)]
        ablation: String,
        /// Write predictions here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn run_plan(plan_path: &Path) -> Result<()> {
    let plan = ExperimentPlan::from_path(plan_path)
        .with_context(|| format!("failed to read plan {}", plan_path.display()))?;
    let report = driver::run(&plan).with_context(|| format!("experiment '{}' failed", plan.name))?;
    info!(
        experiment = report.experiment.experiment_id(),
        rows = report.rows(),
        skipped = report.skipped(),
        "experiment finished"
    );
    Ok(())
}

/// Options of the `score` subcommand
struct ScoreArgs {
    features: PathBuf,
    model_dir: PathBuf,
    model: String,
    score: String,
    data: String,
    ablation: String,
    output: Option<PathBuf>,
}

fn score(args: ScoreArgs) -> Result<()> {
    let model: ModelType = args.model.parse()?;
    let mut session = Session::new(model, args.score.clone(), args.ablation);
    session.set_data_tag(args.data);
    let (ids, predicted) = session
        .score_unlabeled(args.features.as_path(), &args.model_dir)
        .with_context(|| format!("failed to score {}", args.features.display()))?;

    match args.output {
        Some(path) => {
            let mut table = ColumnarTable::new();
            table.push_column(DataColumns::default().identifier, ColumnData::Text(ids))?;
            table.push_column(args.score, ColumnData::Float(predicted.to_vec()))?;
            let batch = table.to_record_batch()?;
            write_csv(&batch, &path, false)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(rows = batch.num_rows(), output = %path.display(), "predictions written");
        }
        None => {
            let mut writer = csv::Writer::from_writer(std::io::stdout().lock());
            writer.write_record([DataColumns::default().identifier, args.score])?;
            for (id, value) in ids.iter().zip(predicted.iter()) {
                writer.write_record([id.clone(), format_float(*value)])?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run { plan } => run_plan(&plan),
        Command::Score {
            features,
            model_dir,
            model,
            score: name,
            data,
            ablation,
            output,
        } => score(ScoreArgs {
            features,
            model_dir,
            model,
            score: name,
            data,
            ablation,
            output,
        }),
    }
}
