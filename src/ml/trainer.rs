// ============================================================
// Layer 5 — Training
// ============================================================
// Two entry points:
//
//   train              fit one configuration on (X, y)
//   train_with_search  cross-validate every candidate the
//                      strategy proposes, then refit the best
//                      one on the whole of (X, y)
//
// Neither touches disk; persisting the result is the tracking
// store's job.

use std::time::Instant;

use anyhow::{Context, Result};
use ndarray::{ArrayView1, ArrayView2};

use crate::ml::estimator::{EstimatorSpec, FittedModel};
use crate::ml::search::{Candidate, ParamGrid, SearchReport, SelectionStrategy};

/// Result of a search-driven fit.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model:           FittedModel,
    /// The base configuration with the best candidate applied.
    pub spec:            EstimatorSpec,
    pub best_params:     Candidate,
    /// Seconds, averaged over the best candidate's folds.
    pub mean_fit_time:   f64,
    /// Seconds, averaged over the best candidate's folds.
    pub mean_score_time: f64,
    pub report:          SearchReport,
}

pub fn train(spec: &EstimatorSpec, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
    tracing::info!("Fitting {} on {} rows", spec.kind(), x.nrows());
    let started = Instant::now();
    let model = spec.fit(x, y).with_context(|| format!("fitting {}", spec.kind()))?;
    tracing::info!(
        "Fitted {} ({}) in {:.2}s",
        spec.kind(),
        model.summary(),
        started.elapsed().as_secs_f64()
    );
    Ok(model)
}

pub fn train_with_search(
    spec: &EstimatorSpec,
    grid: &ParamGrid,
    strategy: &dyn SelectionStrategy,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
) -> Result<TrainOutcome> {
    let report = strategy.select(spec, grid, x, y).context("hyperparameter search failed")?;
    let best   = report.best().clone();
    tracing::info!(
        "Best candidate {:?}: mean_test_score={:.5} (±{:.5})",
        best.params,
        best.mean_test_score,
        best.std_test_score
    );

    let mut tuned = spec.clone();
    for (name, value) in &best.params {
        tuned.set_param(name, value)?;
    }
    let model = train(&tuned, x, y)?;

    Ok(TrainOutcome {
        model,
        spec:            tuned,
        best_params:     best.params,
        mean_fit_time:   best.mean_fit_time,
        mean_score_time: best.mean_score_time,
        report,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::estimator::{ParamValue, TreeParams};
    use crate::ml::search::GridSearch;
    use ndarray::{Array1, Array2};

    fn step() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| (i % 20) as f64);
        let y = x.column(0).mapv(|v| if v < 10.0 { 0.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_train_fits_given_spec() {
        let (x, y) = step();
        let model = train(&EstimatorSpec::DecisionTree(TreeParams::default()), x.view(), y.view()).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_search_refits_best_candidate() {
        let (x, y) = step();
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1), ParamValue::Int(3)]);
        let base = EstimatorSpec::DecisionTree(TreeParams::default());
        let out  = train_with_search(&base, &grid, &GridSearch::default(), x.view(), y.view()).unwrap();

        assert_eq!(out.report.results.len(), 2);
        assert_eq!(out.best_params, out.report.best().params);
        assert_eq!(out.spec.params()["max_depth"], out.best_params["max_depth"].to_string());
        assert!(out.mean_fit_time >= 0.0);
        assert_eq!(out.model, out.spec.fit(x.view(), y.view()).unwrap());
    }

    #[test]
    fn test_search_on_empty_grid_fails() {
        let (x, y) = step();
        let base = EstimatorSpec::DecisionTree(TreeParams::default());
        assert!(train_with_search(&base, &ParamGrid::new(), &GridSearch::default(), x.view(), y.view()).is_err());
    }
}
