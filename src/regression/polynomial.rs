use std::time::Instant;

use anyhow::{ensure, Result};

use super::metrics::{compute_metrics, ModelMetrics};
use super::preprocess::{rows_have_width, validate_training_inputs};
use super::solve;
use super::Regressor;
use crate::ModelKind;

pub const DEFAULT_DEGREE: usize = 2;

/// Polynomial in the first feature column; any other columns are ignored.
#[derive(Debug, Clone)]
pub struct PolynomialRegression {
    degree: usize,
    width: usize,
    coefficients: Option<Vec<f64>>,
}

impl Default for PolynomialRegression {
    fn default() -> Self {
        Self::new(DEFAULT_DEGREE)
    }
}

impl PolynomialRegression {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            width: 0,
            coefficients: None,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Fitted coefficients, constant term first.
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }
}

impl Regressor for PolynomialRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::Polynomial
    }

    fn train(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<ModelMetrics> {
        let started = Instant::now();
        let width = validate_training_inputs(features, targets)?;
        ensure!(self.degree >= 1, "polynomial degree must be at least 1");

        self.coefficients = None;
        self.width = width;
        let x: Vec<f64> = features.iter().map(|row| row[0]).collect();
        self.coefficients = Some(solve::fit_polynomial(&x, targets, self.degree)?);

        let predictions = self.predict(features);
        let metrics = compute_metrics(targets, &predictions)?;
        Ok(metrics.with_training_time(started.elapsed().as_millis() as u64))
    }

    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        let Some(coefficients) = &self.coefficients else {
            return Vec::new();
        };
        if !rows_have_width(features, self.width) {
            tracing::warn!(expected = self.width, "prediction rows do not match the trained input width");
            return Vec::new();
        }

        features
            .iter()
            .map(|row| solve::evaluate_polynomial(coefficients, row[0]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn untrained_model_predicts_nothing() {
        assert!(PolynomialRegression::default().predict(&[vec![1.0]]).is_empty());
    }

    #[test]
    fn fits_quadratic_and_ignores_extra_columns() {
        let features: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, (i * 7 % 3) as f64]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[0] * r[0] + 2.0).collect();

        let mut model = PolynomialRegression::default();
        let metrics = model.train(&features, &targets).expect("train");

        assert_eq!(model.degree(), 2);
        assert_abs_diff_eq!(metrics.r2_score, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.predict(&[vec![10.0, 99.0]])[0], 102.0, epsilon = 1e-6);
    }

    #[test]
    fn cubic_degree_is_respected() {
        let features: Vec<Vec<f64>> = (-4..=4).map(|i| vec![f64::from(i)]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[0].powi(3)).collect();

        let mut model = PolynomialRegression::new(3);
        model.train(&features, &targets).expect("train");

        let coefficients = model.coefficients().expect("coefficients");
        assert_eq!(coefficients.len(), 4);
        assert_abs_diff_eq!(coefficients[3], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn rows_of_another_width_get_no_prediction() {
        let features: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, 1.0, 2.0]).collect();
        let targets: Vec<f64> = features.iter().map(|r| 3.0 * r[0] * r[0]).collect();

        let mut model = PolynomialRegression::default();
        model.train(&features, &targets).expect("train");
        assert!(model.predict(&[vec![]]).is_empty());
        assert!(model.predict(&[vec![5.0]]).is_empty());
        assert_eq!(model.predict(&[vec![5.0, 1.0, 2.0]]).len(), 1);
    }

    #[test]
    fn zero_degree_is_rejected() {
        let mut model = PolynomialRegression::new(0);
        assert!(model.train(&[vec![1.0]], &[1.0]).is_err());
    }
}
