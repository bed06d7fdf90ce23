// ============================================================
// Layer 5 — Linear Models
// ============================================================
// Ordinary least squares, ridge and lasso regression.
//
// With an intercept, X and y are centred first, so the
// coefficients solve the centred problem and
//     intercept = mean(y) - mean(X) · w
//
// OLS / ridge solve the normal equations
//     (XᵀX + αI) w = Xᵀy
// by Gaussian elimination with partial pivoting. The system is
// features × features (8 × 8 here), so no BLAS is needed.
//
// Lasso minimises
//     1/(2n) ‖y - Xw‖² + α ‖w‖₁
// by cyclic coordinate descent with soft-thresholding.

use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::ml::estimator::LassoParams;

/// A fitted linear model: `y = intercept + Σ coefficients[j] * x[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept:    f64,
}

impl LinearModel {
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Centre `x` and `y` when fitting an intercept.
/// Returns (x_centred, y_centred, x_mean, y_mean).
fn centre(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    fit_intercept: bool,
) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    if !fit_intercept {
        return (x.to_owned(), y.to_owned(), Array1::zeros(x.ncols()), 0.0);
    }
    let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    (&x - &x_mean, &y - y_mean, x_mean, y_mean)
}

fn finish(coefficients: Array1<f64>, x_mean: &Array1<f64>, y_mean: f64) -> LinearModel {
    let intercept = y_mean - x_mean.dot(&coefficients);
    LinearModel { coefficients: coefficients.to_vec(), intercept }
}

/// Least squares with an L2 penalty `alpha` (0 = plain OLS).
pub fn fit_least_squares(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    alpha: f64,
    fit_intercept: bool,
) -> Result<LinearModel> {
    let (xc, yc, x_mean, y_mean) = centre(x, y, fit_intercept);

    let mut gram = xc.t().dot(&xc);
    for j in 0..gram.nrows() {
        gram[[j, j]] += alpha;
    }
    let rhs = xc.t().dot(&yc);

    let w = solve(gram, rhs)?;
    Ok(finish(w, &x_mean, y_mean))
}

/// Solve `a · w = b` for square `a` by Gaussian elimination.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    let eps   = scale * 1e-12;

    for col in 0..n {
        // Partial pivot: largest magnitude at or below the diagonal.
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() <= eps {
            bail!("cannot fit linear model: design matrix is singular (column {col})");
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Lasso by cyclic coordinate descent.
pub fn fit_lasso(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &LassoParams) -> Result<LinearModel> {
    if params.alpha < 0.0 {
        bail!("lasso alpha must be >= 0, got {}", params.alpha);
    }
    if params.max_iter == 0 {
        bail!("lasso max_iter must be at least 1");
    }

    let (xc, yc, x_mean, y_mean) = centre(x, y, params.fit_intercept);
    let n = xc.nrows() as f64;
    let p = xc.ncols();

    let col_norms: Vec<f64> = xc.columns().into_iter().map(|c| c.dot(&c)).collect();
    let mut w        = Array1::<f64>::zeros(p);
    let mut residual = yc.clone();
    let penalty      = params.alpha * n;
    let mut converged = false;

    for _ in 0..params.max_iter {
        let mut max_delta  = 0.0_f64;
        let mut max_weight = 0.0_f64;

        for j in 0..p {
            if col_norms[j] == 0.0 {
                continue;
            }
            let col = xc.column(j);
            let old = w[j];
            let rho = col.dot(&residual) + col_norms[j] * old;
            let new = soft_threshold(rho, penalty) / col_norms[j];

            if new != old {
                residual.scaled_add(old - new, &col);
                w[j] = new;
            }
            max_delta  = max_delta.max((new - old).abs());
            max_weight = max_weight.max(new.abs());
        }

        if max_weight == 0.0 || max_delta <= params.tol * max_weight {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(
            "Lasso did not converge in {} iterations (alpha={})",
            params.max_iter,
            params.alpha
        );
    }
    Ok(finish(w, &x_mean, y_mean))
}
