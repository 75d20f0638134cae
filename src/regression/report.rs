use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::preprocess::FeatureScaling;
use super::ModelOutcome;
use crate::config::ModelSettings;
use crate::dataset::FEATURE_COLUMNS;
use crate::ModelKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub(crate) rows: usize,
    pub(crate) train_rows: usize,
    pub(crate) test_rows: usize,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) settings: ModelSettings,
    pub(crate) scaling: Option<Vec<FeatureScaling>>,
    pub(crate) outcomes: Vec<ModelOutcome>,
    pub(crate) best: Option<ModelKind>,
    pub(crate) notes: Vec<String>,
}

impl TrainingReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rows: usize,
        train_rows: usize,
        test_rows: usize,
        settings: ModelSettings,
        scaling: Option<Vec<FeatureScaling>>,
        outcomes: Vec<ModelOutcome>,
        best: Option<ModelKind>,
        notes: Vec<String>,
    ) -> Self {
        Self {
            rows,
            train_rows,
            test_rows,
            timestamp: Utc::now(),
            settings,
            scaling,
            outcomes,
            best,
            notes,
        }
    }

    pub fn outcomes(&self) -> &[ModelOutcome] {
        &self.outcomes
    }

    pub fn best(&self) -> Option<ModelKind> {
        self.best
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "Rows: {} (train {}, test {})",
            self.rows, self.train_rows, self.test_rows
        ));
        lines.push(format!("Seed: {}", self.settings.seed));
        lines.push(format!(
            "Generated at: {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
        lines.push(format!(
            "Best model: {}",
            self.best
                .map(|kind| kind.label().to_string())
                .unwrap_or_else(|| "n/a".to_string())
        ));

        lines.push(String::new());
        lines.push(if self.test_rows > 0 {
            "Holdout metrics:".to_string()
        } else {
            "Training metrics:".to_string()
        });
        lines.push(format!(
            "  {:<22} {:>8} {:>14} {:>14} {:>9} {:>9} {:>9}",
            "model", "R^2", "MAE", "RMSE", "MAPE %", "acc %", "ms"
        ));
        for outcome in &self.outcomes {
            let metrics = outcome.holdout.as_ref().unwrap_or(&outcome.metrics);
            lines.push(format!(
                "  {:<22} {:>8.4} {:>14.2} {:>14.2} {:>9.2} {:>9.2} {:>9}",
                outcome.kind.label(),
                metrics.r2_score,
                metrics.mae,
                metrics.rmse,
                metrics.mape,
                metrics.accuracy * 100.0,
                outcome.metrics.training_time_ms
            ));
        }

        lines.push(String::new());
        lines.push("Residuals:".to_string());
        for outcome in &self.outcomes {
            let r = &outcome.residuals;
            lines.push(format!(
                "  {:<22} mean={:>12.2} std={:>12.2} max|r|={:>12.2}",
                outcome.kind.label(),
                r.mean,
                r.std_dev,
                r.max_abs
            ));
        }

        if let Some(scaling) = &self.scaling {
            lines.push(String::new());
            lines.push("Normalization:".to_string());
            for (name, stat) in FEATURE_COLUMNS.iter().zip(scaling) {
                lines.push(format!(
                    "  {:<16} mean={:>12.6} std={:>12.6}",
                    name, stat.mean, stat.std_dev
                ));
            }
        }

        if !self.notes.is_empty() {
            lines.push(String::new());
            lines.push("Notes:".to_string());
            for note in &self.notes {
                lines.push(format!("  - {}", note));
            }
        }

        lines.join("\n")
    }

    /// Write JSON when `path` ends in `.json`, the rendered table otherwise.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let contents = if is_json {
            serde_json::to_string_pretty(self).context("failed to serialize report")?
        } else {
            self.render()
        };

        fs::write(path, contents)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}
