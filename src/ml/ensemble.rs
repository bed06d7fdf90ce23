// ============================================================
// Layer 5 — Tree Ensembles
// ============================================================
// Random forest:
//   n_estimators trees, each fitted on a bootstrap sample
//   (n draws with replacement). Per-tree seeds are drawn in
//   order from one StdRng seeded with random_state, then the
//   trees are fitted in parallel with rayon. Prediction is the
//   mean over trees, so the result does not depend on thread
//   scheduling.
//
// Gradient boosting (least squares):
//   F₀ = mean(y)
//   Fₘ = Fₘ₋₁ + learning_rate · treeₘ(x)
//   where treeₘ is fitted on the residuals y - Fₘ₋₁, on all
//   rows or on a seeded subsample without replacement when
//   subsample < 1.

use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{rngs::StdRng, seq::index::sample, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ml::estimator::{BoostingParams, ForestParams};
use crate::ml::tree::{RegressionTree, TreeSettings};

// ─── Random forest ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn n_features(&self) -> usize {
        self.trees.first().map_or(0, RegressionTree::n_features)
    }

    pub fn n_trees(&self) -> usize { self.trees.len() }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }
}

pub fn fit_forest(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &ForestParams) -> Result<ForestModel> {
    if params.n_estimators == 0 {
        bail!("n_estimators must be at least 1");
    }
    let settings = TreeSettings::new(params.max_depth, params.min_samples_split, params.min_samples_leaf)?;
    let n = x.nrows();

    let mut master = StdRng::seed_from_u64(params.random_state);
    let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

    let trees: Vec<RegressionTree> = seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            RegressionTree::fit(x, y, &rows, &settings)
        })
        .collect();

    tracing::debug!("Fitted random forest with {} trees", trees.len());
    Ok(ForestModel { trees })
}

// ─── Gradient boosting ────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingModel {
    init:          f64,
    learning_rate: f64,
    trees:         Vec<RegressionTree>,
    n_features:    usize,
}

impl BoostingModel {
    pub fn n_features(&self) -> usize { self.n_features }

    pub fn n_stages(&self) -> usize { self.trees.len() }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.init, |acc, t| acc + self.learning_rate * t.predict_row(row))
    }
}

pub fn fit_boosting(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &BoostingParams) -> Result<BoostingModel> {
    if params.n_estimators == 0 {
        bail!("n_estimators must be at least 1");
    }
    if !(params.learning_rate > 0.0) {
        bail!("learning_rate must be > 0, got {}", params.learning_rate);
    }
    if !(params.subsample > 0.0 && params.subsample <= 1.0) {
        bail!("subsample must be in (0, 1], got {}", params.subsample);
    }
    let settings = TreeSettings::new(params.max_depth, params.min_samples_split, params.min_samples_leaf)?;

    let n         = x.nrows();
    let init      = y.mean().unwrap_or(0.0);
    let mut fx    = Array1::<f64>::from_elem(n, init);
    let mut rng   = StdRng::seed_from_u64(params.random_state);
    let all_rows: Vec<usize> = (0..n).collect();
    let n_sample  = ((n as f64) * params.subsample).round().max(1.0) as usize;
    let mut trees = Vec::with_capacity(params.n_estimators);

    for stage in 0..params.n_estimators {
        let residual = &y - &fx;

        let rows = if n_sample < n {
            let mut picked = sample(&mut rng, n, n_sample).into_vec();
            picked.sort_unstable();
            picked
        } else {
            all_rows.clone()
        };

        let tree = RegressionTree::fit(x, residual.view(), &rows, &settings);
        for (i, row) in x.rows().into_iter().enumerate() {
            fx[i] += params.learning_rate * tree.predict_row(row);
        }
        trees.push(tree);

        if (stage + 1) % 50 == 0 {
            let mse = (&y - &fx).mapv(|r| r * r).mean().unwrap_or(0.0);
            tracing::debug!("Boosting stage {}/{}: train mse={:.5}", stage + 1, params.n_estimators, mse);
        }
    }

    Ok(BoostingModel {
        init,
        learning_rate: params.learning_rate,
        trees,
        n_features: x.ncols(),
    })
}
