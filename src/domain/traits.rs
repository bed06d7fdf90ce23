// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams the serving side depends on:
//   - Model         → a bound, read-only estimator at serve time
//   - ModelRegistry → (name, version) → Model
//
// The serving layer only sees these two, so it can be driven
// by an in-memory fake in tests.

use std::sync::Arc;

use anyhow::Result;

use crate::domain::feature_record::FeatureFrame;
use crate::domain::run_record::RegistryRef;

// ─── Model ────────────────────────────────────────────────────────────────────
/// A resolved estimator ready to score single rows.
pub trait Model: Send + Sync {
    /// Column names, in order, the model was trained on.
    fn input_columns(&self) -> &[String];

    /// Predict the scalar target for one row.
    /// Fails if the frame's columns differ from `input_columns`,
    /// or if the prediction is not a finite number.
    fn predict(&self, frame: &FeatureFrame) -> Result<f64>;
}

// ─── ModelRegistry ────────────────────────────────────────────────────────────
/// Resolves a registered (name, version) to a loaded model.
pub trait ModelRegistry {
    fn resolve(&self, reference: &RegistryRef) -> Result<Arc<dyn Model>>;
}
