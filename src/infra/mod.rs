// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches disk:
//
//   artifact_store.rs — Files kept beside a run
//                       model.json, signature.json and free-form
//                       artifacts (train_config.json,
//                       cv_results.csv)
//
//   tracking.rs       — Experiment tracking + model registry
//                       Writes runs atomically, numbers model
//                       versions, and resolves (name, version)
//                       back to a loaded model for serving.
//
//   metrics.rs        — CV results log
//                       Renders a search report as CSV.

/// Run artifact persistence
pub mod artifact_store;

/// File-backed run store and model registry
pub mod tracking;

/// Cross-validation results CSV
pub mod metrics;
