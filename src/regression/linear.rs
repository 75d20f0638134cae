use std::time::Instant;

use anyhow::Result;
use nalgebra::DVector;

use super::metrics::{compute_metrics, ModelMetrics};
use super::preprocess::{build_design_matrix, rows_have_width, validate_training_inputs};
use super::solve;
use super::Regressor;
use crate::ModelKind;

#[derive(Debug, Clone, PartialEq)]
enum LinearFit {
    Untrained,
    Simple { slope: f64, intercept: f64 },
    Multivariate { weights: Vec<f64>, bias: f64, solver: Solver },
}

impl LinearFit {
    fn width(&self) -> Option<usize> {
        match self {
            LinearFit::Untrained => None,
            LinearFit::Simple { .. } => Some(1),
            LinearFit::Multivariate { weights, .. } => Some(weights.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    NormalEquation,
    GradientDescent,
}

/// Least-squares regression: a direct line fit for a single column, the
/// normal equation otherwise, with gradient descent when `XᵗX` is singular.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    fit: LinearFit,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            fit: LinearFit::Untrained,
        }
    }

    /// `(slope, intercept)` when the model was trained on a single column.
    pub fn line(&self) -> Option<(f64, f64)> {
        match self.fit {
            LinearFit::Simple { slope, intercept } => Some((slope, intercept)),
            _ => None,
        }
    }

    /// `(weights, bias)` of a multivariate fit.
    pub fn coefficients(&self) -> Option<(&[f64], f64)> {
        match &self.fit {
            LinearFit::Multivariate { weights, bias, .. } => Some((weights.as_slice(), *bias)),
            _ => None,
        }
    }

    pub fn solver(&self) -> Option<Solver> {
        match &self.fit {
            LinearFit::Multivariate { solver, .. } => Some(*solver),
            _ => None,
        }
    }
}

impl Regressor for LinearRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn train(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<ModelMetrics> {
        let started = Instant::now();
        let width = validate_training_inputs(features, targets)?;

        self.fit = if width == 1 {
            let x: Vec<f64> = features.iter().map(|row| row[0]).collect();
            let (slope, intercept) = solve::fit_line(&x, targets);
            LinearFit::Simple { slope, intercept }
        } else {
            let design = build_design_matrix(features);
            let target = DVector::from_column_slice(targets);

            match solve::solve_normal_equation(&design, &target) {
                Some(beta) => LinearFit::Multivariate {
                    bias: beta[0],
                    weights: beta.iter().skip(1).copied().collect(),
                    solver: Solver::NormalEquation,
                },
                None => {
                    tracing::info!(
                        epochs = solve::GD_EPOCHS,
                        learning_rate = solve::GD_LEARNING_RATE,
                        "normal matrix is singular; falling back to gradient descent"
                    );
                    let (weights, bias) = solve::gradient_descent(features, targets);
                    LinearFit::Multivariate {
                        weights,
                        bias,
                        solver: Solver::GradientDescent,
                    }
                }
            }
        };

        let predictions = self.predict(features);
        let metrics = compute_metrics(targets, &predictions)?;
        Ok(metrics.with_training_time(started.elapsed().as_millis() as u64))
    }

    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        let Some(width) = self.fit.width() else {
            return Vec::new();
        };
        if !rows_have_width(features, width) {
            tracing::warn!(expected = width, "prediction rows do not match the trained input width");
            return Vec::new();
        }

        match &self.fit {
            LinearFit::Untrained => Vec::new(),
            LinearFit::Simple { slope, intercept } => features
                .iter()
                .map(|row| intercept + slope * row[0])
                .collect(),
            LinearFit::Multivariate { weights, bias, .. } => features
                .iter()
                .map(|row| bias + solve::dot(row, weights))
                .collect(),
        }
    }
}
