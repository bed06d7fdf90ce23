// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All estimator code lives here. No other layer knows how a
// model is fitted or how it predicts; they see EstimatorSpec,
// FittedModel and the domain Model trait.
//
// What's in this layer:
//
//   estimator.rs  — EstimatorSpec (unfitted config, named
//                   hyperparameters) and FittedModel
//
//   linear.rs     — OLS, ridge, lasso
//   tree.rs       — CART regression tree
//   ensemble.rs   — random forest and gradient boosting
//
//   search.rs     — grid / random search with k-fold CV
//   trainer.rs    — fit one spec, or search then refit
//   evaluator.rs  — MSE, MAE, R² on the test split
//   signature.rs  — input/output schema for registration
//   inferencer.rs — fitted model + column names → domain Model

/// Estimator configurations and fitted models
pub mod estimator;

/// Linear least-squares family
pub mod linear;

/// Regression tree
pub mod tree;

/// Tree ensembles
pub mod ensemble;

/// Hyperparameter search
pub mod search;

/// Training entry points
pub mod trainer;

/// Test-set metrics
pub mod evaluator;

/// Model signature inference
pub mod signature;

/// Serving-side model wrapper
pub mod inferencer;
