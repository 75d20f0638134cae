//! Dense feed-forward regressor trained with Adam on mean squared error.
//!
//! Topology is fixed: `input -> 128 -> 64 -> 32 -> 16 -> 1`, ReLU on every
//! hidden layer, linear output, inverted dropout after the first two hidden
//! layers during training only.

use std::time::Instant;

use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::metrics::{compute_metrics, ModelMetrics};
use super::preprocess::validate_training_inputs;
use super::Regressor;
use crate::ModelKind;

pub const HIDDEN_LAYERS: [usize; 4] = [128, 64, 32, 16];
pub const DROPOUT_RATES: [f64; 4] = [0.3, 0.2, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            epochs: 150,
            batch_size: 16,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Dense {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn new(n_in: usize, n_out: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (n_in + n_out) as f64).sqrt();
        Self {
            weights: DMatrix::from_fn(n_in, n_out, |_, _| rng.gen_range(-limit..limit)),
            bias: DVector::zeros(n_out),
        }
    }

    fn affine(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = input * &self.weights;
        for (j, mut column) in z.column_iter_mut().enumerate() {
            column.add_scalar_mut(self.bias[j]);
        }
        z
    }
}

struct Gradient {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
}

struct Moments {
    weights_m: DMatrix<f64>,
    weights_v: DMatrix<f64>,
    bias_m: DVector<f64>,
    bias_v: DVector<f64>,
}

impl Moments {
    fn for_layer(layer: &Dense) -> Self {
        let (rows, cols) = layer.weights.shape();
        Self {
            weights_m: DMatrix::zeros(rows, cols),
            weights_v: DMatrix::zeros(rows, cols),
            bias_m: DVector::zeros(layer.bias.len()),
            bias_v: DVector::zeros(layer.bias.len()),
        }
    }
}

struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    steps: i32,
}

impl Adam {
    fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            steps: 0,
        }
    }

    fn update(&self, params: &mut [f64], grads: &[f64], m: &mut [f64], v: &mut [f64]) {
        let correction1 = 1.0 - self.beta1.powi(self.steps);
        let correction2 = 1.0 - self.beta2.powi(self.steps);

        for (((p, g), m), v) in params.iter_mut().zip(grads).zip(m.iter_mut()).zip(v.iter_mut()) {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }

    fn step(&mut self, layers: &mut [Dense], moments: &mut [Moments], gradients: &[Gradient]) {
        self.steps += 1;
        for ((layer, state), grad) in layers.iter_mut().zip(moments.iter_mut()).zip(gradients) {
            self.update(
                layer.weights.as_mut_slice(),
                grad.weights.as_slice(),
                state.weights_m.as_mut_slice(),
                state.weights_v.as_mut_slice(),
            );
            self.update(
                layer.bias.as_mut_slice(),
                grad.bias.as_slice(),
                state.bias_m.as_mut_slice(),
                state.bias_v.as_mut_slice(),
            );
        }
    }
}

/// Intermediate values of one forward pass, kept for backpropagation.
struct Trace {
    /// `activations[0]` is the input, `activations[i + 1]` the output of layer `i`.
    activations: Vec<DMatrix<f64>>,
    pre_activations: Vec<DMatrix<f64>>,
    masks: Vec<Option<DMatrix<f64>>>,
}

fn forward(layers: &[Dense], input: &DMatrix<f64>, mut dropout: Option<&mut ChaCha8Rng>) -> Trace {
    let mut trace = Trace {
        activations: vec![input.clone()],
        pre_activations: Vec::with_capacity(layers.len()),
        masks: Vec::with_capacity(layers.len()),
    };

    let last = layers.len() - 1;
    for (idx, layer) in layers.iter().enumerate() {
        let z = layer.affine(&trace.activations[idx]);

        if idx == last {
            trace.activations.push(z.clone());
            trace.pre_activations.push(z);
            trace.masks.push(None);
            break;
        }

        let mut a = z.map(|v| v.max(0.0));
        let rate = DROPOUT_RATES.get(idx).copied().unwrap_or(0.0);
        let mask = match dropout.as_deref_mut() {
            Some(rng) if rate > 0.0 => {
                let keep = 1.0 - rate;
                let mask = DMatrix::from_fn(a.nrows(), a.ncols(), |_, _| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                a.component_mul_assign(&mask);
                Some(mask)
            }
            _ => None,
        };

        trace.pre_activations.push(z);
        trace.activations.push(a);
        trace.masks.push(mask);
    }

    trace
}

fn backward(layers: &[Dense], trace: &Trace, targets: &DMatrix<f64>) -> Vec<Gradient> {
    let n = targets.nrows() as f64;
    let output = &trace.activations[layers.len()];
    let mut delta = (output - targets) * (2.0 / n);

    let mut gradients = Vec::with_capacity(layers.len());
    for idx in (0..layers.len()).rev() {
        let weights = trace.activations[idx].transpose() * &delta;
        let bias = DVector::from_iterator(delta.ncols(), delta.column_iter().map(|c| c.sum()));
        gradients.push(Gradient { weights, bias });

        if idx > 0 {
            let mut upstream = &delta * layers[idx].weights.transpose();
            if let Some(mask) = &trace.masks[idx - 1] {
                upstream.component_mul_assign(mask);
            }
            let relu_grad = trace.pre_activations[idx - 1].map(|z| if z > 0.0 { 1.0 } else { 0.0 });
            upstream.component_mul_assign(&relu_grad);
            delta = upstream;
        }
    }

    gradients.reverse();
    gradients
}

fn gather_rows(x: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), x.ncols(), |i, j| x[(indices[i], j)])
}

fn mse(layers: &[Dense], x: &DMatrix<f64>, y: &DMatrix<f64>) -> f64 {
    let trace = forward(layers, x, None);
    let output = &trace.activations[layers.len()];
    (output - y).map(|e| e * e).mean()
}

#[derive(Debug, Clone)]
struct TargetScale {
    mean: f64,
    std_dev: f64,
}

#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    config: NetworkConfig,
    layers: Vec<Dense>,
    target_scale: TargetScale,
    validation_loss: Option<f64>,
}

impl Default for NeuralNetwork {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl NeuralNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            target_scale: TargetScale {
                mean: 0.0,
                std_dev: 1.0,
            },
            validation_loss: None,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(NetworkConfig {
            seed,
            ..NetworkConfig::default()
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// MSE on the held-out rows after the final epoch, in standardized target units.
    pub fn validation_loss(&self) -> Option<f64> {
        self.validation_loss
    }

    fn input_width(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.weights.nrows())
    }
}

impl Regressor for NeuralNetwork {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn train(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<ModelMetrics> {
        let started = Instant::now();
        let width = validate_training_inputs(features, targets)?;
        let n = features.len();

        self.layers.clear();
        self.validation_loss = None;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mean = targets.iter().sum::<f64>() / n as f64;
        let variance = targets.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / n as f64;
        let std_dev = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        let x = DMatrix::from_fn(n, width, |i, j| features[i][j]);
        let y = DMatrix::from_fn(n, 1, |i, _| (targets[i] - mean) / std_dev);

        let mut sizes = vec![width];
        sizes.extend(HIDDEN_LAYERS);
        sizes.push(1);
        let mut layers: Vec<Dense> = sizes
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], &mut rng))
            .collect();
        let mut moments: Vec<Moments> = layers.iter().map(Moments::for_layer).collect();
        let mut adam = Adam::new(self.config.learning_rate);

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let mut holdout = (n as f64 * self.config.validation_split).floor() as usize;
        if holdout >= n {
            holdout = 0;
        }
        let (train_rows, val_rows) = order.split_at(n - holdout);
        let mut train_rows = train_rows.to_vec();
        let x_val = gather_rows(&x, val_rows);
        let y_val = gather_rows(&y, val_rows);

        let batch_size = self.config.batch_size.max(1);
        for epoch in 0..self.config.epochs {
            train_rows.shuffle(&mut rng);

            for batch in train_rows.chunks(batch_size) {
                let x_batch = gather_rows(&x, batch);
                let y_batch = gather_rows(&y, batch);

                let trace = forward(&layers, &x_batch, Some(&mut rng));
                let gradients = backward(&layers, &trace, &y_batch);
                adam.step(&mut layers, &mut moments, &gradients);
            }

            if !val_rows.is_empty() {
                let loss = mse(&layers, &x_val, &y_val);
                tracing::debug!(epoch = epoch + 1, validation_loss = loss, "network epoch");
                self.validation_loss = Some(loss);
            }
        }

        self.layers = layers;
        self.target_scale = TargetScale { mean, std_dev };

        let predictions = self.predict(features);
        let metrics = compute_metrics(targets, &predictions)?;
        Ok(metrics.with_training_time(started.elapsed().as_millis() as u64))
    }

    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        let Some(width) = self.input_width() else {
            return Vec::new();
        };
        if features.iter().any(|row| row.len() != width) {
            tracing::warn!(expected = width, "prediction rows do not match the trained input width");
            return Vec::new();
        }

        let x = DMatrix::from_fn(features.len(), width, |i, j| features[i][j]);
        let trace = forward(&self.layers, &x, None);
        let scale = &self.target_scale;

        trace.activations[self.layers.len()]
            .column(0)
            .iter()
            .map(|v| v * scale.std_dev + scale.mean)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..24)
            .map(|i| vec![(i as f64 - 11.5) / 7.0, 0.0])
            .collect();
        let targets: Vec<f64> = features.iter().map(|r| 100.0 + 40.0 * r[0]).collect();
        (features, targets)
    }

    #[test]
    fn untrained_network_predicts_nothing() {
        assert!(NeuralNetwork::default().predict(&[vec![1.0]]).is_empty());
    }

    #[test]
    fn layer_shapes_follow_topology() {
        let (features, targets) = linear_dataset();
        let mut model = NeuralNetwork::default();
        model.train(&features, &targets).expect("train");

        let shapes: Vec<(usize, usize)> = model.layers.iter().map(|l| l.weights.shape()).collect();
        assert_eq!(shapes, vec![(2, 128), (128, 64), (64, 32), (32, 16), (16, 1)]);
        assert!(model.validation_loss().is_some());
    }

    #[test]
    fn learns_a_linear_relationship() {
        let (features, targets) = linear_dataset();
        let mut model = NeuralNetwork::default();
        let metrics = model.train(&features, &targets).expect("train");

        assert!(metrics.r2_score > 0.8, "r2 = {}", metrics.r2_score);
    }

    #[test]
    fn same_seed_gives_identical_models() {
        let (features, targets) = linear_dataset();
        let mut first = NeuralNetwork::with_seed(7);
        let mut second = NeuralNetwork::with_seed(7);
        first.train(&features, &targets).expect("train");
        second.train(&features, &targets).expect("train");

        assert_eq!(first.predict(&features), second.predict(&features));
    }

    #[test]
    fn inference_is_repeatable() {
        let (features, targets) = linear_dataset();
        let mut model = NeuralNetwork::default();
        model.train(&features, &targets).expect("train");

        assert_eq!(model.predict(&features), model.predict(&features));
    }

    #[test]
    fn mismatched_prediction_width_returns_empty() {
        let (features, targets) = linear_dataset();
        let mut model = NeuralNetwork::default();
        model.train(&features, &targets).expect("train");

        assert!(model.predict(&[vec![1.0, 2.0, 3.0]]).is_empty());
    }

    #[test]
    fn adam_moves_parameters_against_gradient() {
        let mut adam = Adam::new(0.1);
        adam.steps = 1;
        let mut params = [1.0, -1.0];
        let mut m = [0.0, 0.0];
        let mut v = [0.0, 0.0];
        adam.update(&mut params, &[0.5, -0.5], &mut m, &mut v);

        assert!((params[0] - 0.9).abs() < 1e-6);
        assert!((params[1] + 0.9).abs() < 1e-6);
    }
}
