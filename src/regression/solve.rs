use anyhow::{anyhow, ensure, Result};
use nalgebra::{DMatrix, DVector};

pub(crate) const GD_EPOCHS: usize = 1_000;
pub(crate) const GD_LEARNING_RATE: f64 = 0.01;

/// Reciprocal condition number below which `XᵗX` is treated as singular.
const MIN_RCOND: f64 = 1e-12;

/// Closed-form least squares `(XᵗX)⁻¹ Xᵗ y`.
///
/// Returns `None` when the normal matrix is singular or so badly conditioned
/// that the inverse would be noise; callers fall back to an iterative solver.
pub(crate) fn solve_normal_equation(
    design: &DMatrix<f64>,
    target: &DVector<f64>,
) -> Option<DVector<f64>> {
    let gram = design.transpose() * design;

    let singular_values = gram.clone().svd(false, false).singular_values;
    let largest = singular_values.max();
    let smallest = singular_values.min();
    if !(largest > 0.0) || smallest / largest < MIN_RCOND {
        return None;
    }

    let inverse = gram.try_inverse()?;
    let coefficients = inverse * (design.transpose() * target);

    coefficients
        .iter()
        .all(|c| c.is_finite())
        .then_some(coefficients)
}

/// Batch gradient descent on mean squared error, weights and bias start at zero.
pub(crate) fn gradient_descent(features: &[Vec<f64>], targets: &[f64]) -> (Vec<f64>, f64) {
    let m = features.len() as f64;
    let n = features.first().map_or(0, Vec::len);

    let mut weights = vec![0.0; n];
    let mut bias = 0.0;

    for _ in 0..GD_EPOCHS {
        let mut bias_gradient = 0.0;
        let mut weight_gradients = vec![0.0; n];

        for (row, target) in features.iter().zip(targets) {
            let prediction = bias + dot(row, &weights);
            let error = prediction - target;

            bias_gradient += error;
            for (gradient, value) in weight_gradients.iter_mut().zip(row) {
                *gradient += error * value;
            }
        }

        bias -= GD_LEARNING_RATE * bias_gradient / m;
        for (weight, gradient) in weights.iter_mut().zip(&weight_gradients) {
            *weight -= GD_LEARNING_RATE * gradient / m;
        }
    }

    (weights, bias)
}

/// Ordinary least-squares line through `(x, y)`; a constant `x` yields a flat line.
pub(crate) fn fit_line(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        covariance += (xi - mean_x) * (yi - mean_y);
        variance += (xi - mean_x) * (xi - mean_x);
    }

    if variance == 0.0 {
        return (0.0, mean_y);
    }

    let slope = covariance / variance;
    (slope, mean_y - slope * mean_x)
}

/// Least-squares polynomial coefficients, lowest power first.
pub(crate) fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>> {
    ensure!(degree >= 1, "polynomial degree must be at least 1");
    ensure!(!x.is_empty(), "polynomial fit needs at least one point");

    let vandermonde = DMatrix::from_fn(x.len(), degree + 1, |i, j| x[i].powi(j as i32));
    let target = DVector::from_column_slice(y);

    let coefficients = vandermonde
        .svd(true, true)
        .solve(&target, 1e-12)
        .map_err(|msg| anyhow!("polynomial least squares failed: {}", msg))?;

    Ok(coefficients.iter().copied().collect())
}

pub(crate) fn evaluate_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
