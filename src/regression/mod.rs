mod diagnostics;
mod forest;
mod linear;
mod metrics;
mod network;
mod polynomial;
pub mod preprocess;
mod report;
mod solve;
mod tree;

use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ModelSettings, RunConfig};
use crate::dataset::{self, encode_profile, EmployeeProfile, Vocabularies};
use crate::ModelKind;

pub use diagnostics::ResidualSummary;
pub use forest::{RandomForest, DEFAULT_TREES};
pub use linear::{LinearRegression, Solver};
pub use metrics::{compute_metrics, ModelMetrics, ACCURACY_TOLERANCE};
pub use network::{NetworkConfig, NeuralNetwork, DROPOUT_RATES, HIDDEN_LAYERS};
pub use polynomial::{PolynomialRegression, DEFAULT_DEGREE};
pub use preprocess::{FeatureScaling, Normalizer, TrainTestSplit, DEFAULT_TEST_RATIO};
pub use report::TrainingReport;
pub use tree::{DecisionTree, TreeNode};

/// Relative half-width of the band reported around a salary estimate.
pub const ESTIMATE_MARGIN: f64 = 0.1;

/// A model that learns from a numeric feature matrix and a target vector.
pub trait Regressor: Send {
    fn kind(&self) -> ModelKind;

    /// Fit on the given rows and report metrics computed on those same rows.
    fn train(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<ModelMetrics>;

    /// One prediction per row; empty before training or on a width mismatch.
    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64>;
}

pub fn build_model(kind: ModelKind, settings: &ModelSettings) -> Box<dyn Regressor> {
    match kind {
        ModelKind::Linear => Box::new(LinearRegression::new()),
        ModelKind::Polynomial => Box::new(PolynomialRegression::new(settings.degree)),
        ModelKind::NeuralNetwork => Box::new(NeuralNetwork::with_seed(settings.seed)),
        ModelKind::RandomForest => {
            Box::new(RandomForest::new(settings.trees).with_seed(settings.seed))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOutcome {
    pub kind: ModelKind,
    /// Metrics on the training partition.
    pub metrics: ModelMetrics,
    /// Metrics on the held-out partition, when there is one.
    pub holdout: Option<ModelMetrics>,
    pub predictions: Vec<f64>,
    pub residuals: ResidualSummary,
}

impl ModelOutcome {
    pub fn selection_score(&self) -> f64 {
        self.holdout
            .as_ref()
            .map_or(self.metrics.r2_score, |m| m.r2_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryEstimate {
    pub model: ModelKind,
    pub salary: f64,
    pub lower: f64,
    pub upper: f64,
}

impl SalaryEstimate {
    fn around(model: ModelKind, salary: f64) -> Self {
        Self {
            model,
            salary: salary.round(),
            lower: (salary * (1.0 - ESTIMATE_MARGIN)).round(),
            upper: (salary * (1.0 + ESTIMATE_MARGIN)).round(),
        }
    }
}

/// Trained models together with the normalizer fitted on their training rows.
pub struct TrainingSession {
    settings: ModelSettings,
    normalizer: Option<Normalizer>,
    models: Vec<Box<dyn Regressor>>,
    outcomes: Vec<ModelOutcome>,
    train_rows: usize,
    test_rows: usize,
    notes: Vec<String>,
}

impl TrainingSession {
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn normalizer(&self) -> Option<&Normalizer> {
        self.normalizer.as_ref()
    }

    pub fn outcomes(&self) -> &[ModelOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, kind: ModelKind) -> Option<&ModelOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn train_rows(&self) -> usize {
        self.train_rows
    }

    pub fn test_rows(&self) -> usize {
        self.test_rows
    }

    /// Remarks about how the run deviated from the requested settings.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Highest R², preferring holdout metrics; the earlier model wins ties.
    pub fn best(&self) -> Option<&ModelOutcome> {
        let mut best: Option<&ModelOutcome> = None;
        for outcome in &self.outcomes {
            match best {
                Some(current) if outcome.selection_score() <= current.selection_score() => {}
                _ => best = Some(outcome),
            }
        }
        best
    }

    /// Predict raw (un-normalized) feature rows with one of the trained models.
    pub fn predict(&self, kind: ModelKind, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let model = self
            .models
            .iter()
            .find(|m| m.kind() == kind)
            .ok_or_else(|| anyhow!("model '{}' was not trained in this session", kind))?;

        let predictions = match &self.normalizer {
            Some(normalizer) => {
                let scaled = normalizer
                    .transform(rows)
                    .with_context(|| format!("cannot predict with {}", kind))?;
                model.predict(&scaled)
            }
            None => model.predict(rows),
        };
        ensure!(
            predictions.len() == rows.len(),
            "{} produced {} predictions for {} rows; rows must match the training width",
            kind,
            predictions.len(),
            rows.len()
        );
        Ok(predictions)
    }

    pub fn predict_best(&self, rows: &[Vec<f64>]) -> Result<(ModelKind, Vec<f64>)> {
        let best = self
            .best()
            .ok_or_else(|| anyhow!("no trained models available"))?;
        Ok((best.kind, self.predict(best.kind, rows)?))
    }

    pub fn estimate(&self, profile: &EmployeeProfile, vocab: &Vocabularies) -> Result<SalaryEstimate> {
        let row = encode_profile(profile, vocab).features();
        let (model, predictions) = self.predict_best(&[row])?;
        let salary = predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow!("{} returned no prediction", model))?;
        Ok(SalaryEstimate::around(model, salary))
    }

    pub fn report(&self, extra_notes: Vec<String>) -> TrainingReport {
        let mut notes = self.notes.clone();
        notes.extend(extra_notes);
        TrainingReport::new(
            self.train_rows + self.test_rows,
            self.train_rows,
            self.test_rows,
            self.settings.clone(),
            self.normalizer.as_ref().map(|n| n.scaling().to_vec()),
            self.outcomes.clone(),
            self.best().map(|o| o.kind),
            notes,
        )
    }
}

pub fn train_models(
    features: &[Vec<f64>],
    targets: &[f64],
    settings: &ModelSettings,
) -> Result<TrainingSession> {
    settings.validate()?;
    preprocess::validate_training_inputs(features, targets)?;

    let mut notes = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    let mut split = preprocess::split_train_test(features, targets, settings.test_ratio, &mut rng)?;
    if split.train_features.is_empty() {
        warn!(
            rows = features.len(),
            test_ratio = settings.test_ratio,
            "split leaves no training rows; evaluating in-sample"
        );
        notes.push(format!(
            "Test ratio {} leaves no training rows for {} row(s); all rows train and metrics are in-sample.",
            settings.test_ratio,
            features.len()
        ));
        let identity: Vec<usize> = (0..features.len()).collect();
        split = preprocess::split_with_permutation(features, targets, 0.0, &identity)?;
    }

    let (normalizer, split) = if settings.normalize {
        let normalizer = Normalizer::fit(&split.train_features)?;
        let scaled = TrainTestSplit {
            train_features: normalizer.transform(&split.train_features)?,
            test_features: normalizer.transform(&split.test_features)?,
            ..split
        };
        (Some(normalizer), scaled)
    } else {
        (None, split)
    };

    let mut models: Vec<Box<dyn Regressor>> = settings
        .models
        .iter()
        .map(|&kind| build_model(kind, settings))
        .collect();

    let outcomes = if settings.parallel {
        models
            .par_iter_mut()
            .map(|model| train_one(&mut **model, &split))
            .collect::<Result<Vec<_>>>()?
    } else {
        models
            .iter_mut()
            .map(|model| train_one(&mut **model, &split))
            .collect::<Result<Vec<_>>>()?
    };

    Ok(TrainingSession {
        settings: settings.clone(),
        normalizer,
        models,
        outcomes,
        train_rows: split.train_targets.len(),
        test_rows: split.test_targets.len(),
        notes,
    })
}

fn train_one(model: &mut dyn Regressor, split: &TrainTestSplit) -> Result<ModelOutcome> {
    let kind = model.kind();
    info!(model = %kind, rows = split.train_targets.len(), "training model");

    let metrics = model
        .train(&split.train_features, &split.train_targets)
        .with_context(|| format!("{} failed to train", kind))?;

    let (holdout, predictions, residuals) = if split.test_targets.is_empty() {
        let predictions = model.predict(&split.train_features);
        let residuals = diagnostics::summarize_residuals(&split.train_targets, &predictions);
        (None, predictions, residuals)
    } else {
        let predictions = model.predict(&split.test_features);
        let holdout = compute_metrics(&split.test_targets, &predictions)
            .with_context(|| format!("{} holdout evaluation failed", kind))?;
        let residuals = diagnostics::summarize_residuals(&split.test_targets, &predictions);
        (Some(holdout), predictions, residuals)
    };

    info!(
        model = %kind,
        r2 = metrics.r2_score,
        holdout_r2 = holdout.as_ref().map(|m| m.r2_score),
        elapsed_ms = metrics.training_time_ms,
        "model trained"
    );

    Ok(ModelOutcome {
        kind,
        metrics,
        holdout,
        predictions,
        residuals,
    })
}

/// Load the dataset named by `config`, train every requested model and
/// summarize the run.
pub fn fit_models(config: &RunConfig) -> Result<TrainingReport> {
    let vocab = load_vocabularies(config.vocab.as_deref())?;
    let records = dataset::load_records(&config.dataset)?;
    let (features, targets) = dataset::encode_records(&records, &vocab);

    let session = train_models(&features, &targets, &config.settings)?;

    let mut notes = Vec::new();
    if config.settings.normalize {
        notes.push("Features normalized to zero mean and unit variance on the training rows.".to_string());
    }
    if session.test_rows() == 0 {
        notes.push("No holdout rows: metrics are in-sample.".to_string());
    }
    if config.vocab.is_some() {
        notes.push("Category codes taken from a custom vocabulary file.".to_string());
    }

    Ok(session.report(notes))
}

pub fn load_vocabularies(path: Option<&Path>) -> Result<Vocabularies> {
    match path {
        Some(path) => Vocabularies::from_json_file(path),
        None => Ok(Vocabularies::default()),
    }
}
