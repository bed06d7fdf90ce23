use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// A labelled table: named feature columns plus one target per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns:  Vec<String>,
    features: Array2<f64>,
    targets:  Array1<f64>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, features: Array2<f64>, targets: Array1<f64>) -> Result<Self> {
        if features.ncols() != columns.len() {
            bail!(
                "dataset has {} column names but {} feature columns",
                columns.len(),
                features.ncols()
            );
        }
        if features.nrows() != targets.len() {
            bail!(
                "dataset has {} feature rows but {} targets",
                features.nrows(),
                targets.len()
            );
        }
        Ok(Self { columns, features, targets })
    }

    pub fn len(&self) -> usize { self.targets.len() }

    pub fn is_empty(&self) -> bool { self.targets.is_empty() }

    pub fn columns(&self) -> &[String] { &self.columns }

    pub fn features(&self) -> ArrayView2<'_, f64> { self.features.view() }

    pub fn targets(&self) -> ArrayView1<'_, f64> { self.targets.view() }

    /// Copy the given rows, in the given order, into a new dataset.
    pub fn select(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns:  self.columns.clone(),
            features: self.features.select(Axis(0), rows),
            targets:  self.targets.select(Axis(0), rows),
        }
    }

    /// The first `n` feature rows (fewer if the dataset is smaller).
    pub fn head(&self, n: usize) -> ArrayView2<'_, f64> {
        let n = n.min(self.len());
        self.features.slice(s![..n, ..])
    }
}

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Any component that can produce the full labelled dataset.
///
/// Implementations:
///   - CsvLoader         → California Housing CSV on disk
///   - CaliforniaHousing → downloaded once, then read from a cache
///   - SyntheticSource   → seeded generator, only when asked for
pub trait DatasetSource {
    fn load(&self) -> Result<Dataset>;
}
