// ============================================================
// Layer 5 — Estimator Specs and Fitted Models
// ============================================================
// EstimatorSpec is the unfitted configuration: which model
// family and its hyperparameters. It is what a config file
// names, what a grid search mutates (`set_param`), and what
// gets logged as run params (`params`).
//
// FittedModel is the output of `EstimatorSpec::fit`. It is
// plain serde data so the tracking store can persist it as
// JSON and reload it bit-for-bit.

use std::fmt;

use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::domain::run_record::Params;
use crate::ml::ensemble::{self, BoostingModel, ForestModel};
use crate::ml::linear::{self, LinearModel};
use crate::ml::tree::{RegressionTree, TreeSettings};

// ─── Hyperparameter values ────────────────────────────────────────────────────
/// A single hyperparameter value, as written in configs and grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "None"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self { ParamValue::Int(v) }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self { ParamValue::Float(v) }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self { ParamValue::Bool(v) }
}

fn as_f64(name: &str, v: &ParamValue) -> Result<f64> {
    match v {
        ParamValue::Float(x) => Ok(*x),
        ParamValue::Int(i) => Ok(*i as f64),
        other => bail!("parameter '{name}' expects a number, got {other}"),
    }
}

fn as_usize(name: &str, v: &ParamValue) -> Result<usize> {
    match v {
        ParamValue::Int(i) if *i >= 0 => Ok(*i as usize),
        other => bail!("parameter '{name}' expects a non-negative integer, got {other}"),
    }
}

fn as_opt_usize(name: &str, v: &ParamValue) -> Result<Option<usize>> {
    match v {
        ParamValue::Null => Ok(None),
        other => as_usize(name, other).map(Some),
    }
}

fn as_bool(name: &str, v: &ParamValue) -> Result<bool> {
    match v {
        ParamValue::Bool(b) => Ok(*b),
        other => bail!("parameter '{name}' expects true or false, got {other}"),
    }
}

fn opt_to_string(v: Option<usize>) -> String {
    v.map_or_else(|| "None".to_string(), |d| d.to_string())
}

// ─── Per-family hyperparameters ───────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { fit_intercept: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    pub alpha:         f64,
    pub fit_intercept: bool,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self { alpha: 1.0, fit_intercept: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoParams {
    pub alpha:         f64,
    pub max_iter:      usize,
    pub tol:           f64,
    pub fit_intercept: bool,
}

impl Default for LassoParams {
    fn default() -> Self {
        Self { alpha: 1.0, max_iter: 1000, tol: 1e-4, fit_intercept: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: None, min_samples_split: 2, min_samples_leaf: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators:      usize,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub random_state:      u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            max_depth:         None,
            min_samples_split: 2,
            min_samples_leaf:  1,
            random_state:      42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators:      usize,
    pub learning_rate:     f64,
    pub max_depth:         Option<usize>,
    pub subsample:         f64,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub random_state:      u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            learning_rate:     0.1,
            max_depth:         Some(3),
            subsample:         1.0,
            min_samples_split: 2,
            min_samples_leaf:  1,
            random_state:      42,
        }
    }
}

// ─── EstimatorSpec ────────────────────────────────────────────────────────────
/// An unfitted regression estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    LinearRegression(LinearParams),
    Ridge(RidgeParams),
    Lasso(LassoParams),
    DecisionTree(TreeParams),
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
}

impl EstimatorSpec {
    /// Short family name, used in logs and as a run param.
    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorSpec::LinearRegression(_) => "linear_regression",
            EstimatorSpec::Ridge(_) => "ridge",
            EstimatorSpec::Lasso(_) => "lasso",
            EstimatorSpec::DecisionTree(_) => "decision_tree",
            EstimatorSpec::RandomForest(_) => "random_forest",
            EstimatorSpec::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// All hyperparameters as `name → display string`.
    pub fn params(&self) -> Params {
        let pairs: Vec<(&str, String)> = match self {
            EstimatorSpec::LinearRegression(p) => vec![("fit_intercept", p.fit_intercept.to_string())],
            EstimatorSpec::Ridge(p) => vec![
                ("alpha", p.alpha.to_string()),
                ("fit_intercept", p.fit_intercept.to_string()),
            ],
            EstimatorSpec::Lasso(p) => vec![
                ("alpha", p.alpha.to_string()),
                ("max_iter", p.max_iter.to_string()),
                ("tol", p.tol.to_string()),
                ("fit_intercept", p.fit_intercept.to_string()),
            ],
            EstimatorSpec::DecisionTree(p) => vec![
                ("max_depth", opt_to_string(p.max_depth)),
                ("min_samples_split", p.min_samples_split.to_string()),
                ("min_samples_leaf", p.min_samples_leaf.to_string()),
            ],
            EstimatorSpec::RandomForest(p) => vec![
                ("n_estimators", p.n_estimators.to_string()),
                ("max_depth", opt_to_string(p.max_depth)),
                ("min_samples_split", p.min_samples_split.to_string()),
                ("min_samples_leaf", p.min_samples_leaf.to_string()),
                ("random_state", p.random_state.to_string()),
            ],
            EstimatorSpec::GradientBoosting(p) => vec![
                ("n_estimators", p.n_estimators.to_string()),
                ("learning_rate", p.learning_rate.to_string()),
                ("max_depth", opt_to_string(p.max_depth)),
                ("subsample", p.subsample.to_string()),
                ("min_samples_split", p.min_samples_split.to_string()),
                ("min_samples_leaf", p.min_samples_leaf.to_string()),
                ("random_state", p.random_state.to_string()),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// Overwrite one hyperparameter by name.
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let kind = self.kind();
        match (self, name) {
            (EstimatorSpec::LinearRegression(p), "fit_intercept") => p.fit_intercept = as_bool(name, value)?,

            (EstimatorSpec::Ridge(p), "alpha") => p.alpha = as_f64(name, value)?,
            (EstimatorSpec::Ridge(p), "fit_intercept") => p.fit_intercept = as_bool(name, value)?,

            (EstimatorSpec::Lasso(p), "alpha") => p.alpha = as_f64(name, value)?,
            (EstimatorSpec::Lasso(p), "max_iter") => p.max_iter = as_usize(name, value)?,
            (EstimatorSpec::Lasso(p), "tol") => p.tol = as_f64(name, value)?,
            (EstimatorSpec::Lasso(p), "fit_intercept") => p.fit_intercept = as_bool(name, value)?,

            (EstimatorSpec::DecisionTree(p), "max_depth") => p.max_depth = as_opt_usize(name, value)?,
            (EstimatorSpec::DecisionTree(p), "min_samples_split") => p.min_samples_split = as_usize(name, value)?,
            (EstimatorSpec::DecisionTree(p), "min_samples_leaf") => p.min_samples_leaf = as_usize(name, value)?,

            (EstimatorSpec::RandomForest(p), "n_estimators") => p.n_estimators = as_usize(name, value)?,
            (EstimatorSpec::RandomForest(p), "max_depth") => p.max_depth = as_opt_usize(name, value)?,
            (EstimatorSpec::RandomForest(p), "min_samples_split") => p.min_samples_split = as_usize(name, value)?,
            (EstimatorSpec::RandomForest(p), "min_samples_leaf") => p.min_samples_leaf = as_usize(name, value)?,
            (EstimatorSpec::RandomForest(p), "random_state") => p.random_state = as_usize(name, value)? as u64,

            (EstimatorSpec::GradientBoosting(p), "n_estimators") => p.n_estimators = as_usize(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "learning_rate") => p.learning_rate = as_f64(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "max_depth") => p.max_depth = as_opt_usize(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "subsample") => p.subsample = as_f64(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "min_samples_split") => p.min_samples_split = as_usize(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "min_samples_leaf") => p.min_samples_leaf = as_usize(name, value)?,
            (EstimatorSpec::GradientBoosting(p), "random_state") => p.random_state = as_usize(name, value)? as u64,

            (_, other) => bail!("invalid parameter '{other}' for estimator {kind}"),
        }
        Ok(())
    }

    /// Fit this configuration on `x` (rows × features) and `y`.
    pub fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        if x.nrows() == 0 {
            bail!("cannot fit {} on an empty training set", self.kind());
        }
        if x.nrows() != y.len() {
            bail!("found {} feature rows but {} targets", x.nrows(), y.len());
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            bail!("training data contains NaN or infinite values");
        }

        let model = match self {
            EstimatorSpec::LinearRegression(p) => {
                FittedModel::Linear(linear::fit_least_squares(x, y, 0.0, p.fit_intercept)?)
            }
            EstimatorSpec::Ridge(p) => {
                if p.alpha < 0.0 {
                    bail!("ridge alpha must be >= 0, got {}", p.alpha);
                }
                FittedModel::Linear(linear::fit_least_squares(x, y, p.alpha, p.fit_intercept)?)
            }
            EstimatorSpec::Lasso(p) => FittedModel::Linear(linear::fit_lasso(x, y, p)?),
            EstimatorSpec::DecisionTree(p) => {
                let settings = TreeSettings::new(p.max_depth, p.min_samples_split, p.min_samples_leaf)?;
                let rows: Vec<usize> = (0..x.nrows()).collect();
                FittedModel::Tree(RegressionTree::fit(x, y, &rows, &settings))
            }
            EstimatorSpec::RandomForest(p) => FittedModel::Forest(ensemble::fit_forest(x, y, p)?),
            EstimatorSpec::GradientBoosting(p) => FittedModel::Boosting(ensemble::fit_boosting(x, y, p)?),
        };
        Ok(model)
    }
}

impl Default for EstimatorSpec {
    fn default() -> Self {
        EstimatorSpec::GradientBoosting(BoostingParams {
            n_estimators: 150,
            max_depth:    Some(5),
            ..BoostingParams::default()
        })
    }
}

// ─── FittedModel ──────────────────────────────────────────────────────────────
/// A fitted regression model. Read-only after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Linear(LinearModel),
    Tree(RegressionTree),
    Forest(ForestModel),
    Boosting(BoostingModel),
}

impl FittedModel {
    /// Number of input features the model was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            FittedModel::Linear(m) => m.coefficients.len(),
            FittedModel::Tree(m) => m.n_features(),
            FittedModel::Forest(m) => m.n_features(),
            FittedModel::Boosting(m) => m.n_features(),
        }
    }

    /// Size of the fitted model, for logs.
    pub fn summary(&self) -> String {
        match self {
            FittedModel::Linear(m) => format!("{} coefficients", m.coefficients.len()),
            FittedModel::Tree(m) => format!("{} nodes, depth {}", m.node_count(), m.depth()),
            FittedModel::Forest(m) => format!("{} trees", m.n_trees()),
            FittedModel::Boosting(m) => format!("{} stages", m.n_stages()),
        }
    }

    /// Predict one row. The row length must equal `n_features`.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<f64> {
        if row.len() != self.n_features() {
            bail!("model expects {} features, got {}", self.n_features(), row.len());
        }
        Ok(match self {
            FittedModel::Linear(m) => m.predict_row(row),
            FittedModel::Tree(m) => m.predict_row(row),
            FittedModel::Forest(m) => m.predict_row(row),
            FittedModel::Boosting(m) => m.predict_row(row),
        })
    }

    /// Predict every row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features() {
            bail!("model expects {} features, got {}", self.n_features(), x.ncols());
        }
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 7) % 5) as f64 });
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_spec_json_round_trip() {
        let json = r#"{"kind": "random_forest", "n_estimators": 12, "max_depth": 3}"#;
        let spec: EstimatorSpec = serde_json::from_str(json).unwrap();
        match &spec {
            EstimatorSpec::RandomForest(p) => {
                assert_eq!(p.n_estimators, 12);
                assert_eq!(p.max_depth, Some(3));
                assert_eq!(p.random_state, 42);
            }
            other => panic!("unexpected {other:?}"),
        }
        let back: EstimatorSpec = serde_json::from_str(&serde_json::to_string(&spec).unwrap()).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_set_param() {
        let mut spec = EstimatorSpec::RandomForest(ForestParams::default());
        spec.set_param("max_depth", &ParamValue::Int(2)).unwrap();
        spec.set_param("n_estimators", &ParamValue::Int(12)).unwrap();
        let params = spec.params();
        assert_eq!(params["max_depth"], "2");
        assert_eq!(params["n_estimators"], "12");

        spec.set_param("max_depth", &ParamValue::Null).unwrap();
        assert_eq!(spec.params()["max_depth"], "None");
    }

    #[test]
    fn test_set_param_rejects_unknown_and_mistyped() {
        let mut spec = EstimatorSpec::Ridge(RidgeParams::default());
        assert!(spec.set_param("n_estimators", &ParamValue::Int(3)).is_err());
        assert!(spec.set_param("alpha", &ParamValue::Bool(true)).is_err());
        spec.set_param("alpha", &ParamValue::Int(2)).unwrap();
        assert_eq!(spec.params()["alpha"], "2");
    }

    #[test]
    fn test_default_spec_is_production_boosting() {
        let params = EstimatorSpec::default().params();
        assert_eq!(params["n_estimators"], "150");
        assert_eq!(params["max_depth"], "5");
        assert_eq!(params["random_state"], "42");
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let spec = EstimatorSpec::LinearRegression(LinearParams::default());
        let empty_x = Array2::<f64>::zeros((0, 2));
        let empty_y = Array1::<f64>::zeros(0);
        assert!(spec.fit(empty_x.view(), empty_y.view()).is_err());

        let x = array![[1.0], [2.0]];
        assert!(spec.fit(x.view(), array![1.0].view()).is_err());
        assert!(spec.fit(x.view(), array![1.0, f64::NAN].view()).is_err());
    }

    #[test]
    fn test_every_family_fits_and_predicts() {
        let (x, y) = line();
        let specs = vec![
            EstimatorSpec::LinearRegression(LinearParams::default()),
            EstimatorSpec::Ridge(RidgeParams::default()),
            EstimatorSpec::Lasso(LassoParams { alpha: 0.01, ..LassoParams::default() }),
            EstimatorSpec::DecisionTree(TreeParams::default()),
            EstimatorSpec::RandomForest(ForestParams { n_estimators: 5, ..ForestParams::default() }),
            EstimatorSpec::GradientBoosting(BoostingParams { n_estimators: 20, ..BoostingParams::default() }),
        ];
        for spec in specs {
            let model = spec.fit(x.view(), y.view()).unwrap();
            assert_eq!(model.n_features(), 2);
            let pred = model.predict(x.view()).unwrap();
            assert_eq!(pred.len(), 20);
            assert!(pred.iter().all(|p| p.is_finite()), "{}", spec.kind());
            assert!(model.predict(Array2::<f64>::zeros((1, 3)).view()).is_err());
        }
    }

    #[test]
    fn test_summary_reports_model_size() {
        let (x, y) = line();
        let forest = EstimatorSpec::RandomForest(ForestParams { n_estimators: 4, ..ForestParams::default() });
        assert_eq!(forest.fit(x.view(), y.view()).unwrap().summary(), "4 trees");
        let linear = EstimatorSpec::LinearRegression(LinearParams::default());
        assert_eq!(linear.fit(x.view(), y.view()).unwrap().summary(), "2 coefficients");
        let stump = EstimatorSpec::DecisionTree(TreeParams { max_depth: Some(1), ..TreeParams::default() });
        assert_eq!(stump.fit(x.view(), y.view()).unwrap().summary(), "3 nodes, depth 1");
    }

    #[test]
    fn test_fitted_model_json_is_lossless() {
        let (x, y) = line();
        let spec  = EstimatorSpec::GradientBoosting(BoostingParams { n_estimators: 10, ..BoostingParams::default() });
        let model = spec.fit(x.view(), y.view()).unwrap();
        let back: FittedModel = serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.predict(x.view()).unwrap(), model.predict(x.view()).unwrap());
    }
}
