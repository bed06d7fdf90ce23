// ============================================================
// Layer 5 — Signature Inference
// ============================================================
// Derives the input/output schema stored with a registered
// model from sample training rows and the model's predictions
// on them. Every column here is a 64-bit float ("double");
// the output is a single unnamed column.

use anyhow::{bail, Result};
use ndarray::{ArrayView1, ArrayView2};

use crate::domain::run_record::{ColumnSpec, ModelSignature};

const DOUBLE: &str = "double";

pub fn infer_signature(
    columns: &[String],
    sample_rows: ArrayView2<'_, f64>,
    predictions: ArrayView1<'_, f64>,
) -> Result<ModelSignature> {
    if sample_rows.nrows() == 0 {
        bail!("cannot infer a signature from zero sample rows");
    }
    if sample_rows.ncols() != columns.len() {
        bail!("{} column names for {} sample columns", columns.len(), sample_rows.ncols());
    }
    if predictions.len() != sample_rows.nrows() {
        bail!("{} predictions for {} sample rows", predictions.len(), sample_rows.nrows());
    }
    if let Some(((_, col), _)) = sample_rows.indexed_iter().find(|(_, v)| !v.is_finite()) {
        bail!("sample column '{}' contains a non-finite value", columns[col]);
    }
    if predictions.iter().any(|p| !p.is_finite()) {
        bail!("model produced a non-finite prediction on the sample rows");
    }

    Ok(ModelSignature {
        inputs: columns
            .iter()
            .map(|name| ColumnSpec { name: Some(name.clone()), dtype: DOUBLE.to_string() })
            .collect(),
        outputs: vec![ColumnSpec { name: None, dtype: DOUBLE.to_string() }],
    })
}
