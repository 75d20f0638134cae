use std::time::Instant;

use anyhow::{ensure, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::metrics::{compute_metrics, ModelMetrics};
use super::preprocess::{rows_have_width, validate_training_inputs};
use super::tree::{DecisionTree, MIN_VARIANCE};
use super::Regressor;
use crate::ModelKind;

pub const DEFAULT_TREES: usize = 15;

/// Bagged regression trees; prediction is the unweighted mean over trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_trees: usize,
    bootstrap: bool,
    min_variance: f64,
    seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(DEFAULT_TREES)
    }
}

impl RandomForest {
    pub fn new(n_trees: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_trees,
            bootstrap: true,
            min_variance: MIN_VARIANCE,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Without bootstrap every tree sees the training rows unchanged.
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_min_variance(mut self, min_variance: f64) -> Self {
        self.min_variance = min_variance;
        self
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn sample_indices(&self, n_samples: usize, tree_idx: usize) -> Vec<usize> {
        if !self.bootstrap {
            return (0..n_samples).collect();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));
        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
    }
}

impl Regressor for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn train(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<ModelMetrics> {
        let started = Instant::now();
        validate_training_inputs(features, targets)?;
        ensure!(self.n_trees > 0, "random forest needs at least one tree");

        self.trees.clear();
        let mut trees = Vec::with_capacity(self.n_trees);
        for tree_idx in 0..self.n_trees {
            let indices = self.sample_indices(features.len(), tree_idx);
            let sample_features: Vec<Vec<f64>> = indices.iter().map(|&i| features[i].clone()).collect();
            let sample_targets: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();

            let mut tree = DecisionTree::new().with_min_variance(self.min_variance);
            tree.fit(&sample_features, &sample_targets)?;
            tracing::debug!(tree = tree_idx, depth = tree.depth(), "grew forest tree");
            trees.push(tree);
        }
        self.trees = trees;

        let predictions = self.predict(features);
        let metrics = compute_metrics(targets, &predictions)?;
        Ok(metrics.with_training_time(started.elapsed().as_millis() as u64))
    }

    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        let Some(width) = self.trees.first().and_then(DecisionTree::n_features) else {
            return Vec::new();
        };
        if !rows_have_width(features, width) {
            tracing::warn!(expected = width, "prediction rows do not match the trained input width");
            return Vec::new();
        }

        let count = self.trees.len() as f64;
        features
            .iter()
            .map(|row| {
                self.trees
                    .iter()
                    .filter_map(|tree| tree.predict_row(row))
                    .sum::<f64>()
                    / count
            })
            .collect()
    }
}
