// ============================================================
// Layer 5 — CART Regression Tree
// ============================================================
// Binary tree minimising squared error.
//
// At each node, for every feature the node's rows are sorted
// by that feature and every boundary between two distinct
// values is scored with running sums:
//
//     gain = sumL² / nL + sumR² / nR
//
// (maximising this is the same as minimising SSE_left +
// SSE_right). The threshold is the midpoint of the two values;
// rows with x[f] <= threshold go left.
//
// A node becomes a leaf (mean of its targets) when it hits
// max_depth, has fewer than min_samples_split rows, is pure,
// or no split leaves min_samples_leaf rows on both sides.
//
// Nodes live in a flat Vec and are built with an explicit
// stack, so deep unbounded trees do not recurse.
//
// The builder takes a list of row indices rather than a copy
// of the data; bootstrap samples just repeat indices.

use anyhow::{bail, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Stopping rules shared by trees, forests and boosting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSettings {
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
}

impl TreeSettings {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Result<Self> {
        if max_depth == Some(0) {
            bail!("max_depth must be at least 1");
        }
        if min_samples_split < 2 {
            bail!("min_samples_split must be at least 2, got {min_samples_split}");
        }
        if min_samples_leaf < 1 {
            bail!("min_samples_leaf must be at least 1");
        }
        Ok(Self { max_depth, min_samples_split, min_samples_leaf })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes:      Vec<Node>,
    n_features: usize,
}

struct BestSplit {
    feature:   usize,
    threshold: f64,
    left:      Vec<usize>,
    right:     Vec<usize>,
}

impl RegressionTree {
    /// Fit on the rows of `x`/`y` listed in `rows` (repeats allowed).
    /// `rows` must be non-empty.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, rows: &[usize], settings: &TreeSettings) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, rows.to_vec(), 0)];

        while let Some((slot, idx, depth)) = stack.pop() {
            let value = mean(y, &idx);

            let may_split = settings.max_depth.map_or(true, |d| depth < d)
                && idx.len() >= settings.min_samples_split
                && idx.len() >= 2 * settings.min_samples_leaf
                && !is_pure(y, &idx);

            let split = if may_split { best_split(x, y, &idx, settings.min_samples_leaf) } else { None };

            match split {
                Some(s) => {
                    let left  = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[slot] = Node::Split { feature: s.feature, threshold: s.threshold, left, right };
                    stack.push((right, s.right, depth + 1));
                    stack.push((left, s.left, depth + 1));
                }
                None => nodes[slot] = Node::Leaf { value },
            }
        }

        Self { nodes, n_features: x.ncols() }
    }

    pub fn n_features(&self) -> usize { self.n_features }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack   = vec![(0usize, 0usize)];
        while let Some((i, d)) = stack.pop() {
            match &self.nodes[i] {
                Node::Leaf { .. } => deepest = deepest.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((*left, d + 1));
                    stack.push((*right, d + 1));
                }
            }
        }
        deepest
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    i = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn mean(y: ArrayView1<'_, f64>, idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
}

fn is_pure(y: ArrayView1<'_, f64>, idx: &[usize]) -> bool {
    let first = y[idx[0]];
    idx.iter().all(|&i| y[i] == first)
}

fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    idx: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n     = idx.len();
    let total = idx.iter().map(|&i| y[i]).sum::<f64>();
    let base  = total * total / n as f64;

    // (gain, feature, threshold)
    let mut best: Option<(f64, usize, f64)> = None;
    let mut sorted = idx.to_vec();

    for f in 0..x.ncols() {
        sorted.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += y[sorted[k]];
            let n_left  = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let lo = x[[sorted[k], f]];
            let hi = x[[sorted[k + 1], f]];
            if lo == hi {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if gain <= base {
                continue;
            }
            if best.map_or(true, |(g, ..)| gain > g) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some((gain, f, threshold));
            }
        }
    }

    let (_, feature, threshold) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = idx.iter().copied().partition(|&i| x[[i, feature]] <= threshold);
    Some(BestSplit { feature, threshold, left, right })
}
