use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{FitArgs, TrainingArgs};
use crate::regression::{DEFAULT_DEGREE, DEFAULT_TEST_RATIO, DEFAULT_TREES};
use crate::ModelKind;

pub const DEFAULT_SEED: u64 = 42;

/// Knobs shared by every training run, whichever command triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    pub models: Vec<ModelKind>,
    pub test_ratio: f64,
    pub seed: u64,
    pub degree: usize,
    pub trees: usize,
    pub normalize: bool,
    pub parallel: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            models: ModelKind::ALL.to_vec(),
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SEED,
            degree: DEFAULT_DEGREE,
            trees: DEFAULT_TREES,
            normalize: true,
            parallel: false,
        }
    }
}

impl ModelSettings {
    pub fn from_training_args(args: TrainingArgs) -> Self {
        Self {
            models: args.models,
            test_ratio: args.test_ratio,
            seed: args.seed,
            degree: args.degree,
            trees: args.trees,
            normalize: !args.no_normalize,
            parallel: args.parallel,
        }
    }

    /// Train every model when none were named.
    pub fn with_defaults(mut self) -> Self {
        if self.models.is_empty() {
            self.models = ModelKind::ALL.to_vec();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.models.is_empty(), "at least one model must be selected");

        let mut seen = HashSet::new();
        for model in &self.models {
            ensure!(seen.insert(model), "model '{}' listed multiple times", model);
        }

        ensure!(
            (0.0..1.0).contains(&self.test_ratio),
            "test ratio must be within [0, 1), got {}",
            self.test_ratio
        );
        ensure!(self.degree >= 1, "polynomial degree must be at least 1");
        ensure!(self.trees >= 1, "random forest needs at least one tree");

        Ok(())
    }
}

/// Runtime configuration compiled from CLI input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: PathBuf,
    pub vocab: Option<PathBuf>,
    pub settings: ModelSettings,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn from_fit_args(args: FitArgs) -> Self {
        Self {
            dataset: args.dataset,
            vocab: args.training.vocab.clone(),
            settings: ModelSettings::from_training_args(args.training),
            output: args.output,
            dry_run: args.dry_run,
        }
    }

    pub fn with_defaults(mut self) -> Self {
        self.settings = self.settings.with_defaults();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        if !self.dry_run && !self.dataset.exists() {
            bail!(
                "Dataset '{}' does not exist; use --dry-run to preview without the file",
                self.dataset.display()
            );
        }

        if let Some(vocab) = &self.vocab {
            ensure!(
                vocab.exists(),
                "vocabulary file '{}' does not exist",
                vocab.display()
            );
        }

        Ok(())
    }

    pub fn summary(&self) -> String {
        let settings = &self.settings;
        let models = settings
            .models
            .iter()
            .map(ModelKind::label)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            concat!(
                "Models: {}\n",
                "Dataset: {}\n",
                "Vocabulary: {}\n",
                "Test ratio: {}\n",
                "Seed: {}\n",
                "Polynomial degree: {}\n",
                "Forest trees: {}\n",
                "Normalization: {}\n",
                "Execution: {}"
            ),
            models,
            self.dataset.display(),
            self.vocab
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string()),
            settings.test_ratio,
            settings.seed,
            settings.degree,
            settings.trees,
            if settings.normalize {
                "enabled"
            } else {
                "disabled"
            },
            if settings.parallel {
                "parallel"
            } else {
                "sequential"
            }
        )
    }
}
