mod cli;
pub mod config;
pub mod dataset;
pub mod regression;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use cli::{Cli, Commands, FitArgs, PredictArgs, StatsArgs};
use config::ModelSettings;
use dataset::{Currency, DataStats, EmployeeProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Linear,
    Polynomial,
    NeuralNetwork,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Linear,
        ModelKind::Polynomial,
        ModelKind::NeuralNetwork,
        ModelKind::RandomForest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Linear => "Linear Regression",
            ModelKind::Polynomial => "Polynomial Regression",
            ModelKind::NeuralNetwork => "Neural Network",
            ModelKind::RandomForest => "Random Forest",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit(args) => handle_fit(args),
        Commands::Predict(args) => handle_predict(args),
        Commands::Stats(args) => handle_stats(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let config = config::RunConfig::from_fit_args(args).with_defaults();
    config.validate()?;

    println!("--> Configuration\n{}", config.summary());

    if config.dry_run {
        println!("\nDry run requested: skipping model training.");
        return Ok(());
    }

    let report = regression::fit_models(&config)?;
    println!("\n--> Report\n{}", report.render());

    if let Some(path) = &config.output {
        report.persist(path)?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<()> {
    let vocab = regression::load_vocabularies(args.training.vocab.as_deref())?;
    let settings = ModelSettings::from_training_args(args.training).with_defaults();
    settings.validate()?;

    let profile = EmployeeProfile {
        years_experience: args.experience,
        education_level: args.education,
        job_title: args.job_title,
        location: args.location,
        company_size: args.company_size,
        skills: args
            .skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        industry: args.industry,
        work_mode: args.work_mode,
    };

    let records = dataset::load_records(&args.dataset)?;
    let (features, targets) = dataset::encode_records(&records, &vocab);
    let session = regression::train_models(&features, &targets, &settings)?;
    let estimate = session.estimate(&profile, &vocab)?;
    let currency = Currency::for_location(&profile.location);

    println!("--> Estimate");
    println!("Model: {}", estimate.model);
    println!("Salary: {}", currency.format(estimate.salary));
    println!(
        "Range: {} - {}",
        currency.format(estimate.lower),
        currency.format(estimate.upper)
    );

    Ok(())
}

fn handle_stats(args: StatsArgs) -> Result<()> {
    let records = dataset::load_records(&args.dataset)?;
    let stats = DataStats::from_records(&records)?;
    println!("--> Dataset\n{}", stats.render());
    Ok(())
}
