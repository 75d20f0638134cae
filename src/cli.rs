use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_SEED;
use crate::regression::{DEFAULT_DEGREE, DEFAULT_TEST_RATIO, DEFAULT_TREES};
use crate::ModelKind;

/// Command-line interface definition for the salary model toolkit.
#[derive(Parser, Debug)]
#[command(
    name = "salary-models",
    version,
    about = "Train and compare salary regression models from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the selected models on an employee CSV and report their metrics.
    Fit(FitArgs),
    /// Train on a dataset, then estimate the salary of one employee profile.
    Predict(PredictArgs),
    /// Summarize an employee CSV without training anything.
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct TrainingArgs {
    /// Comma-separated models to train (defaults to all four).
    #[arg(long, value_enum, value_delimiter = ',', num_args = 1..)]
    pub models: Vec<ModelKind>,

    /// Fraction of rows held out for evaluation; 0 evaluates in-sample.
    #[arg(long, value_name = "RATIO", default_value_t = DEFAULT_TEST_RATIO)]
    pub test_ratio: f64,

    /// Seed for the split, network initialization and bootstrap sampling.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Degree of the polynomial model.
    #[arg(long, default_value_t = DEFAULT_DEGREE)]
    pub degree: usize,

    /// Number of trees in the random forest.
    #[arg(long, default_value_t = DEFAULT_TREES)]
    pub trees: usize,

    /// Train on raw encoded features instead of z-scored ones.
    #[arg(long)]
    pub no_normalize: bool,

    /// Train the models on worker threads.
    #[arg(long)]
    pub parallel: bool,

    /// JSON file with category vocabularies replacing the built-in lists.
    #[arg(long, value_name = "PATH")]
    pub vocab: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Path to the employee CSV dataset.
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    #[command(flatten)]
    pub training: TrainingArgs,

    /// Write the report here (JSON when the extension is .json).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Preview configuration without training.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Path to the employee CSV dataset used for training.
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    #[command(flatten)]
    pub training: TrainingArgs,

    #[arg(long, value_name = "YEARS")]
    pub experience: f64,

    #[arg(long)]
    pub education: String,

    #[arg(long)]
    pub job_title: String,

    #[arg(long)]
    pub location: String,

    #[arg(long)]
    pub company_size: String,

    /// Comma-separated skill labels.
    #[arg(long, value_delimiter = ',')]
    pub skills: Vec<String>,

    #[arg(long)]
    pub industry: String,

    #[arg(long)]
    pub work_mode: String,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,
}
