use anyhow::{ensure, Result};
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEST_RATIO: f64 = 0.2;

/// Reject empty, ragged or misaligned training data before any model sees it.
pub(crate) fn validate_training_inputs(features: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    ensure!(!features.is_empty(), "training requires at least one feature row");
    ensure!(
        features.len() == targets.len(),
        "feature rows ({}) and targets ({}) differ in length",
        features.len(),
        targets.len()
    );

    let width = features[0].len();
    ensure!(width > 0, "feature rows must contain at least one column");
    for (row_idx, row) in features.iter().enumerate() {
        ensure!(
            row.len() == width,
            "feature row {} has {} columns, expected {}",
            row_idx,
            row.len(),
            width
        );
    }

    Ok(width)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub mean: f64,
    pub std_dev: f64,
}

/// Per-column z-score statistics fitted once and reusable for later rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    scaling: Vec<FeatureScaling>,
}

impl Normalizer {
    pub fn fit(data: &[Vec<f64>]) -> Result<Self> {
        let row_count = data.len();
        ensure!(row_count > 0, "no feature rows to analyze");

        let feature_count = data[0].len();
        ensure!(feature_count > 0, "feature rows must contain at least one column");
        ensure!(
            data.iter().all(|row| row.len() == feature_count),
            "feature rows must all have {} columns",
            feature_count
        );

        let mut scaling = Vec::with_capacity(feature_count);
        for j in 0..feature_count {
            let mean = data.iter().map(|row| row[j]).sum::<f64>() / row_count as f64;

            let variance = data
                .iter()
                .map(|row| {
                    let diff = row[j] - mean;
                    diff * diff
                })
                .sum::<f64>()
                / row_count as f64;

            scaling.push(FeatureScaling {
                mean,
                std_dev: variance.sqrt(),
            });
        }

        Ok(Self { scaling })
    }

    pub fn scaling(&self) -> &[FeatureScaling] {
        &self.scaling
    }

    pub fn means(&self) -> Vec<f64> {
        self.scaling.iter().map(|s| s.mean).collect()
    }

    pub fn std_devs(&self) -> Vec<f64> {
        self.scaling.iter().map(|s| s.std_dev).collect()
    }

    /// Number of columns the normalizer was fitted on.
    pub fn width(&self) -> usize {
        self.scaling.len()
    }

    /// Constant columns carry no information and map to exactly zero.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        ensure!(
            row.len() == self.width(),
            "row has {} columns, normalizer was fitted on {}",
            row.len(),
            self.width()
        );

        Ok(row
            .iter()
            .zip(&self.scaling)
            .map(|(value, stat)| {
                if stat.std_dev == 0.0 {
                    0.0
                } else {
                    (value - stat.mean) / stat.std_dev
                }
            })
            .collect())
    }

    pub fn transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        data.iter().map(|row| self.transform_row(row)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainTestSplit {
    pub train_features: Vec<Vec<f64>>,
    pub train_targets: Vec<f64>,
    pub test_features: Vec<Vec<f64>>,
    pub test_targets: Vec<f64>,
}

/// Shuffle row indices with `rng`, then cut at `floor(n * (1 - test_ratio))`.
pub fn split_train_test<R: Rng + ?Sized>(
    features: &[Vec<f64>],
    targets: &[f64],
    test_ratio: f64,
    rng: &mut R,
) -> Result<TrainTestSplit> {
    let mut permutation: Vec<usize> = (0..features.len()).collect();
    permutation.shuffle(rng);
    split_with_permutation(features, targets, test_ratio, &permutation)
}

pub fn split_with_permutation(
    features: &[Vec<f64>],
    targets: &[f64],
    test_ratio: f64,
    permutation: &[usize],
) -> Result<TrainTestSplit> {
    ensure!(
        features.len() == targets.len(),
        "feature rows ({}) and targets ({}) differ in length",
        features.len(),
        targets.len()
    );
    ensure!(
        (0.0..1.0).contains(&test_ratio),
        "test ratio must be within [0, 1), got {}",
        test_ratio
    );
    ensure!(
        permutation.len() == features.len(),
        "permutation covers {} rows, dataset has {}",
        permutation.len(),
        features.len()
    );

    let mut seen = vec![false; features.len()];
    for &idx in permutation {
        ensure!(
            idx < features.len() && !seen[idx],
            "permutation is not a reordering of 0..{}",
            features.len()
        );
        seen[idx] = true;
    }

    let cut = (features.len() as f64 * (1.0 - test_ratio)).floor() as usize;
    let (train_idx, test_idx) = permutation.split_at(cut);

    let split = TrainTestSplit {
        train_features: train_idx.iter().map(|&i| features[i].clone()).collect(),
        train_targets: train_idx.iter().map(|&i| targets[i]).collect(),
        test_features: test_idx.iter().map(|&i| features[i].clone()).collect(),
        test_targets: test_idx.iter().map(|&i| targets[i]).collect(),
    };

    tracing::debug!(
        train = split.train_targets.len(),
        test = split.test_targets.len(),
        "dataset split"
    );

    Ok(split)
}

/// True when every row has exactly `width` columns.
pub(crate) fn rows_have_width(features: &[Vec<f64>], width: usize) -> bool {
    features.iter().all(|row| row.len() == width)
}

pub(crate) fn build_design_matrix(features: &[Vec<f64>]) -> DMatrix<f64> {
    let rows = features.len();
    let cols = if rows > 0 { features[0].len() } else { 0 };
    let mut buffer = Vec::with_capacity(rows * (cols + 1));

    for row in features {
        buffer.push(1.0); // intercept
        buffer.extend(row.iter().copied());
    }

    DMatrix::from_row_slice(rows, cols + 1, &buffer)
}
