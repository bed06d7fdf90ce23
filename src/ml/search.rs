// ============================================================
// Layer 5 — Hyperparameter Search
// ============================================================
// A SelectionStrategy decides WHICH candidates to try; the
// shared cross-validation routine decides how they are scored:
//
//   for each candidate (in parallel, order preserved):
//       for each of k contiguous folds:
//           fit on k-1 folds  (timed)
//           predict held-out  (timed)
//           score = -MSE
//   mean_test_score = mean over folds
//
// The best candidate has the highest mean score; on ties the
// lowest candidate index wins.
//
// Implementations:
//   - GridSearch   → every combination of the grid
//   - RandomSearch → n_iter distinct combinations, seeded

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::splitter::k_fold;
use crate::ml::estimator::{EstimatorSpec, ParamValue};
use crate::ml::evaluator::mean_squared_error;

/// One hyperparameter assignment.
pub type Candidate = BTreeMap<String, ParamValue>;

/// Parameter name → values to try.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(pub BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    #[cfg(test)]
    pub fn new() -> Self { Self::default() }

    #[cfg(test)]
    pub fn with(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    /// Number of combinations; 0 if the grid is empty.
    pub fn size(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(Vec::len).product()
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.0.is_empty() {
            bail!("parameter grid is empty");
        }
        if let Some((name, _)) = self.0.iter().find(|(_, v)| v.is_empty()) {
            bail!("parameter grid entry '{name}' has no values");
        }
        Ok(())
    }

    /// The `index`-th combination: keys in sorted order, last key fastest.
    fn candidate_at(&self, mut index: usize) -> Candidate {
        let mut out: Vec<(String, ParamValue)> = Vec::with_capacity(self.0.len());
        for (name, values) in self.0.iter().rev() {
            out.push((name.clone(), values[index % values.len()].clone()));
            index /= values.len();
        }
        out.into_iter().collect()
    }

    /// Every combination, in order.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        self.ensure_not_empty()?;
        Ok((0..self.size()).map(|i| self.candidate_at(i)).collect())
    }
}

/// Cross-validation outcome for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub params:          Candidate,
    pub fold_scores:     Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score:  f64,
    /// Seconds.
    pub mean_fit_time:   f64,
    /// Seconds.
    pub mean_score_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub results:    Vec<CandidateResult>,
    pub best_index: usize,
}

impl SearchReport {
    pub fn best(&self) -> &CandidateResult {
        &self.results[self.best_index]
    }
}

// ─── SelectionStrategy ────────────────────────────────────────────────────────
/// Picks candidates from a grid and scores them by k-fold CV.
pub trait SelectionStrategy: Send + Sync {
    /// Short name for logs and run params.
    fn name(&self) -> &'static str;

    /// Number of CV folds.
    fn folds(&self) -> usize;

    /// Candidates to evaluate, in evaluation order.
    fn candidates(&self, grid: &ParamGrid) -> Result<Vec<Candidate>>;

    /// Score every candidate and pick the best.
    fn select(
        &self,
        base: &EstimatorSpec,
        grid: &ParamGrid,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<SearchReport> {
        let candidates = self.candidates(grid)?;
        tracing::info!(
            "{}: {} candidates × {} folds",
            self.name(),
            candidates.len(),
            self.folds()
        );
        cross_validate(base, candidates, self.folds(), x, y)
    }
}

/// Exhaustive search over the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSearch {
    pub folds: usize,
}

impl Default for GridSearch {
    fn default() -> Self { Self { folds: 3 } }
}

impl SelectionStrategy for GridSearch {
    fn name(&self) -> &'static str { "grid_search" }

    fn folds(&self) -> usize { self.folds }

    fn candidates(&self, grid: &ParamGrid) -> Result<Vec<Candidate>> {
        grid.candidates()
    }
}

/// `n_iter` distinct grid combinations drawn with a seeded RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomSearch {
    pub folds:  usize,
    pub n_iter: usize,
    pub seed:   u64,
}

impl SelectionStrategy for RandomSearch {
    fn name(&self) -> &'static str { "random_search" }

    fn folds(&self) -> usize { self.folds }

    fn candidates(&self, grid: &ParamGrid) -> Result<Vec<Candidate>> {
        grid.ensure_not_empty()?;
        if self.n_iter == 0 {
            bail!("random search needs n_iter >= 1");
        }
        let total  = grid.size();
        let amount = self.n_iter.min(total);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut picked = sample(&mut rng, total, amount).into_vec();
        picked.sort_unstable();
        Ok(picked.into_iter().map(|i| grid.candidate_at(i)).collect())
    }
}

/// Strategy choice as written in a training config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Grid {
        #[serde(default = "default_folds")]
        folds: usize,
    },
    Random {
        #[serde(default = "default_folds")]
        folds:  usize,
        n_iter: usize,
        #[serde(default)]
        seed:   u64,
    },
}

fn default_folds() -> usize { 3 }

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Grid { folds: default_folds() }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn SelectionStrategy> {
        match *self {
            StrategyConfig::Grid { folds } => Box::new(GridSearch { folds }),
            StrategyConfig::Random { folds, n_iter, seed } => Box::new(RandomSearch { folds, n_iter, seed }),
        }
    }
}

// ─── Cross-validation ─────────────────────────────────────────────────────────
fn cross_validate(
    base: &EstimatorSpec,
    candidates: Vec<Candidate>,
    folds: usize,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
) -> Result<SearchReport> {
    let splits = k_fold(x.nrows(), folds)?;

    let results: Vec<CandidateResult> = candidates
        .into_par_iter()
        .map(|params| {
            let mut spec = base.clone();
            for (name, value) in &params {
                spec.set_param(name, value)?;
            }

            let mut fold_scores = Vec::with_capacity(splits.len());
            let mut fit_time    = 0.0;
            let mut score_time  = 0.0;

            for fold in &splits {
                let x_train = x.select(Axis(0), &fold.train);
                let y_train = y.select(Axis(0), &fold.train);
                let x_test  = x.select(Axis(0), &fold.test);
                let y_test  = y.select(Axis(0), &fold.test);

                let started = Instant::now();
                let model   = spec
                    .fit(x_train.view(), y_train.view())
                    .with_context(|| format!("fitting candidate {params:?}"))?;
                fit_time += started.elapsed().as_secs_f64();

                let started = Instant::now();
                let pred    = model.predict(x_test.view())?;
                let score   = -mean_squared_error(y_test.view(), pred.view())?;
                score_time += started.elapsed().as_secs_f64();

                fold_scores.push(score);
            }

            let k    = fold_scores.len() as f64;
            let mean = fold_scores.iter().sum::<f64>() / k;
            let var  = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / k;

            tracing::debug!("candidate {:?}: mean_test_score={:.5}", params, mean);

            Ok(CandidateResult {
                params,
                fold_scores,
                mean_test_score: mean,
                std_test_score:  var.sqrt(),
                mean_fit_time:   fit_time / k,
                mean_score_time: score_time / k,
            })
        })
        .collect::<Result<_>>()?;

    let mut best_index: Option<usize> = None;
    for (i, r) in results.iter().enumerate() {
        if !r.mean_test_score.is_finite() {
            continue;
        }
        if best_index.map_or(true, |b| r.mean_test_score > results[b].mean_test_score) {
            best_index = Some(i);
        }
    }
    let best_index = best_index.context("no candidate produced a finite cross-validation score")?;

    Ok(SearchReport { results, best_index })
}
