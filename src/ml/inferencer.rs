// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Binds a fitted model to the column names it was trained on
// and scores single-row frames. This is what the registry
// hands back to the prediction service.

use anyhow::{bail, Result};
use ndarray::ArrayView1;

use crate::domain::feature_record::FeatureFrame;
use crate::domain::traits::Model;
use crate::ml::estimator::FittedModel;

pub struct Inferencer {
    model:   FittedModel,
    columns: Vec<String>,
}

impl Inferencer {
    pub fn new(model: FittedModel, columns: Vec<String>) -> Result<Self> {
        if model.n_features() != columns.len() {
            bail!(
                "model has {} features but {} column names were given",
                model.n_features(),
                columns.len()
            );
        }
        Ok(Self { model, columns })
    }
}

impl Model for Inferencer {
    fn input_columns(&self) -> &[String] { &self.columns }

    fn predict(&self, frame: &FeatureFrame) -> Result<f64> {
        if frame.columns != self.columns {
            bail!(
                "frame columns {:?} do not match model columns {:?}",
                frame.columns,
                self.columns
            );
        }
        let prediction = self.model.predict_row(ArrayView1::from(frame.values.as_slice()))?;
        if !prediction.is_finite() {
            bail!("model produced a non-finite prediction ({prediction}) for {:?}", frame.values);
        }
        tracing::debug!("Predicted {:.5}", prediction);
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_record::{FeatureRecord, MODEL_COLUMNS};
    use crate::ml::estimator::{EstimatorSpec, LinearParams};
    use ndarray::{Array1, Array2};

    fn columns() -> Vec<String> { MODEL_COLUMNS.iter().map(|c| c.to_string()).collect() }

    /// y = slope * MedInc
    fn medinc_model(slope: f64) -> FittedModel {
        let x = Array2::from_shape_fn((20, 8), |(i, j)| ((i * i * (j + 2) + i * j * j + 3 * j) % 13) as f64);
        let y: Array1<f64> = x.column(0).mapv(|v| v * slope);
        EstimatorSpec::LinearRegression(LinearParams::default()).fit(x.view(), y.view()).unwrap()
    }

    #[test]
    fn test_predicts_from_feature_frame() {
        let inf    = Inferencer::new(medinc_model(0.5), columns()).unwrap();
        let record = FeatureRecord::from_values([4.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let p = inf.predict(&record.to_frame()).unwrap();
        assert!((p - 2.0).abs() < 1e-6, "{p}");
    }

    #[test]
    fn test_rejects_reordered_columns() {
        let inf = Inferencer::new(medinc_model(0.5), columns()).unwrap();
        let mut frame = FeatureRecord::from_values([1.0; 8]).to_frame();
        frame.columns.swap(0, 1);
        assert!(inf.predict(&frame).is_err());
    }

    #[test]
    fn test_overflowing_prediction_is_an_error() {
        let inf    = Inferencer::new(medinc_model(4.0), columns()).unwrap();
        let record = FeatureRecord::from_values([f64::MAX, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let err    = inf.predict(&record.to_frame()).unwrap_err();
        assert!(err.to_string().contains("non-finite"), "{err}");
    }

    #[test]
    fn test_column_count_must_match_model() {
        assert!(Inferencer::new(medinc_model(0.5), vec!["MedInc".into()]).is_err());
    }
}
