use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// A prediction counts as accurate when its relative error is at most 15%.
pub const ACCURACY_TOLERANCE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub r2_score: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Percent; `inf` when some actual value is zero.
    pub mape: f64,
    pub accuracy: f64,
    pub training_time_ms: u64,
}

impl ModelMetrics {
    pub(crate) fn with_training_time(mut self, millis: u64) -> Self {
        self.training_time_ms = millis;
        self
    }
}

pub fn compute_metrics(actual: &[f64], predicted: &[f64]) -> Result<ModelMetrics> {
    let n = actual.len();
    ensure!(n > 0, "cannot compute metrics without observations");
    ensure!(
        predicted.len() == n,
        "expected {} predictions, got {}",
        n,
        predicted.len()
    );

    let mean_actual = actual.iter().sum::<f64>() / n as f64;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    let mut abs_error = 0.0;
    let mut relative_error = 0.0;
    let mut within_tolerance = 0usize;
    let mut zero_actuals = 0usize;

    for (&a, &p) in actual.iter().zip(predicted) {
        let error = a - p;
        ss_res += error * error;
        ss_tot += (a - mean_actual) * (a - mean_actual);
        abs_error += error.abs();

        if a == 0.0 {
            zero_actuals += 1;
            relative_error = f64::INFINITY;
            continue;
        }

        let relative = (error / a).abs();
        relative_error += relative;
        if relative <= ACCURACY_TOLERANCE {
            within_tolerance += 1;
        }
    }

    if zero_actuals > 0 {
        tracing::warn!(
            zero_actuals,
            "actual values of zero make MAPE undefined; reporting infinity"
        );
    }

    let r2_score = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).max(0.0)
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(ModelMetrics {
        r2_score,
        mae: abs_error / n as f64,
        rmse: (ss_res / n as f64).sqrt(),
        mape: relative_error / n as f64 * 100.0,
        accuracy: within_tolerance as f64 / n as f64,
        training_time_ms: 0,
    })
}
