// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Regression metrics on the held-out test split:
//
//   MSE = mean((y - ŷ)²)
//   MAE = mean(|y - ŷ|)
//   R²  = 1 - SS_res / SS_tot
//
// When y is constant SS_tot is 0: R² is 1.0 for a perfect fit
// and 0.0 otherwise.

use anyhow::{bail, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::domain::run_record::Metrics;
use crate::ml::estimator::FittedModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mean_squared_error:  f64,
    pub mean_absolute_error: f64,
    pub r2:                  f64,
}

impl EvaluationMetrics {
    /// Metric name → value, as logged on a run.
    pub fn to_metrics(&self) -> Metrics {
        Metrics::from([
            ("mean_squared_error".to_string(), self.mean_squared_error),
            ("mean_absolute_error".to_string(), self.mean_absolute_error),
            ("r2".to_string(), self.r2),
        ])
    }
}

fn check(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<()> {
    if y_true.is_empty() {
        bail!("cannot evaluate on an empty test set");
    }
    if y_true.len() != y_pred.len() {
        bail!("{} targets but {} predictions", y_true.len(), y_pred.len());
    }
    Ok(())
}

pub fn mean_squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let sum: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    Ok(sum / y_true.len() as f64)
}

pub fn mean_absolute_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let sum: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).abs()).sum();
    Ok(sum / y_true.len() as f64)
}

pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    check(y_true, y_pred)?;
    let mean   = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Predict `x` with `model` and score against `y`.
pub fn evaluate(model: &FittedModel, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<EvaluationMetrics> {
    if x.nrows() == 0 {
        bail!("cannot evaluate on an empty test set");
    }
    let pred = model.predict(x)?;
    let metrics = EvaluationMetrics {
        mean_squared_error:  mean_squared_error(y, pred.view())?,
        mean_absolute_error: mean_absolute_error(y, pred.view())?,
        r2:                  r2_score(y, pred.view())?,
    };
    for (name, value) in metrics.to_metrics() {
        if !value.is_finite() {
            bail!("test metric {name} is not finite ({value})");
        }
    }
    tracing::info!(
        "Test metrics: mse={:.5} mae={:.5} r2={:.4}",
        metrics.mean_squared_error,
        metrics.mean_absolute_error,
        metrics.r2
    );
    Ok(metrics)
}
