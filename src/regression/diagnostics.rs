use serde::{Deserialize, Serialize};

/// Summary statistics for the residuals `actual - predicted` of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub max_abs: f64,
}

pub(crate) fn summarize_residuals(actual: &[f64], predicted: &[f64]) -> ResidualSummary {
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let n = residuals.len().max(1) as f64;
    let mean = residuals.iter().sum::<f64>() / n;

    let mut variance_sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut max_abs = 0.0;

    for value in residuals.iter().copied() {
        variance_sum += {
            let diff = value - mean;
            diff * diff
        };
        min = min.min(value);
        max = max.max(value);
        if value.abs() > max_abs {
            max_abs = value.abs();
        }
    }

    if residuals.is_empty() {
        min = 0.0;
        max = 0.0;
    }

    ResidualSummary {
        mean,
        std_dev: (variance_sum / n).sqrt(),
        min,
        max,
        max_abs,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn summarizes_signed_residuals() {
        let summary = summarize_residuals(&[10.0, 20.0, 30.0], &[12.0, 20.0, 25.0]);
        assert_abs_diff_eq!(summary.mean, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.min, -2.0);
        assert_abs_diff_eq!(summary.max, 5.0);
        assert_abs_diff_eq!(summary.max_abs, 5.0);
        assert_abs_diff_eq!(summary.std_dev, (26.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn empty_residuals_are_all_zero() {
        let summary = summarize_residuals(&[], &[]);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 0.0);
        assert_eq!(summary.std_dev, 0.0);
    }
}
