// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads the California Housing table from a CSV file.
//
// Expected layout (the scikit-learn `as_frame` export):
//
//   MedInc,HouseAge,AveRooms,AveBedrms,Population,AveOccup,Latitude,Longitude,MedHouseVal
//   8.3252,41.0,6.98,1.02,322.0,2.55,37.88,-122.23,4.526
//   ...
//
// Columns are located by header name, so their order in the
// file does not matter and extra columns are ignored. The
// loaded dataset always has the features in MODEL_COLUMNS
// order. Every cell must be numeric; blank lines are skipped.

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};

use crate::data::dataset::{Dataset, DatasetSource};
use crate::domain::feature_record::{MODEL_COLUMNS, TARGET_COLUMN};

/// Reads the dataset from a CSV file on disk.
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for CsvLoader {
    fn load(&self) -> Result<Dataset> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;

        let dataset = parse_csv(&text)
            .with_context(|| format!("Invalid dataset '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} rows from '{}'",
            dataset.len(),
            self.path.display()
        );
        Ok(dataset)
    }
}

/// Parse CSV text into a dataset with MODEL_COLUMNS features.
pub fn parse_csv(text: &str) -> Result<Dataset> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = match lines.next() {
        Some(h) => h,
        None => bail!("file is empty"),
    };
    let header: Vec<&str> = header.split(',').map(|h| h.trim().trim_matches('"')).collect();

    let locate = |name: &str| -> Result<usize> {
        header
            .iter()
            .position(|h| *h == name)
            .with_context(|| format!("missing column '{name}'"))
    };
    let feature_idx: Vec<usize> = MODEL_COLUMNS.iter().map(|&c| locate(c)).collect::<Result<_>>()?;
    let target_idx = locate(TARGET_COLUMN)?;

    let mut values  = Vec::new();
    let mut targets = Vec::new();

    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != header.len() {
            bail!(
                "line {}: expected {} cells, found {}",
                line_no + 1,
                header.len(),
                cells.len()
            );
        }

        let cell = |idx: usize| -> Result<f64> {
            cells[idx].parse::<f64>().with_context(|| {
                format!("line {}: '{}' in column '{}' is not a number", line_no + 1, cells[idx], header[idx])
            })
        };

        for &idx in &feature_idx {
            values.push(cell(idx)?);
        }
        targets.push(cell(target_idx)?);
    }

    if targets.is_empty() {
        bail!("file has a header but no rows");
    }

    let features = Array2::from_shape_vec((targets.len(), MODEL_COLUMNS.len()), values)?;
    Dataset::new(
        MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        features,
        Array1::from(targets),
    )
}
