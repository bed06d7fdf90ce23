// ============================================================
// Layer 4 — Train/Test Splitter and K-Fold
// ============================================================
// Two ways of partitioning rows:
//
//   train_test_split — seeded shuffle, then the first
//                      ceil(n * test_fraction) rows become the
//                      held-out test set, the rest train.
//                      Same seed → same partition, every run.
//
//   k_fold           — contiguous, unshuffled folds used by
//                      cross-validation. The first n % k folds
//                      carry one extra row.
//
// Shuffling uses Fisher-Yates via rand::seq::SliceRandom over
// a StdRng seeded from the caller's seed.

use anyhow::{bail, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::dataset::Dataset;

/// Row indices of one cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Shuffle `items` with a seeded RNG and split off the test share.
///
/// Returns `(train, test)`; `test.len() == ceil(len * test_fraction)`.
pub fn shuffle_split<T>(mut items: Vec<T>, test_fraction: f64, seed: u64) -> Result<(Vec<T>, Vec<T>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        bail!("test fraction must be in (0, 1), got {test_fraction}");
    }

    let total  = items.len();
    let n_test = ((total as f64) * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= total {
        bail!(
            "cannot split {total} rows with test fraction {test_fraction}: \
             one partition would be empty"
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let train = items.split_off(n_test);
    Ok((train, items))
}

/// Deterministically partition a dataset into `(train, test)`.
pub fn train_test_split(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if dataset.is_empty() {
        bail!("cannot split an empty dataset");
    }
    let rows: Vec<usize> = (0..dataset.len()).collect();
    let (train_rows, test_rows) = shuffle_split(rows, test_fraction, seed)?;

    tracing::debug!(
        "Dataset split: {} training, {} test (seed {})",
        train_rows.len(),
        test_rows.len(),
        seed,
    );

    Ok((dataset.select(&train_rows), dataset.select(&test_rows)))
}

/// Contiguous k-fold partition of `0..n`.
pub fn k_fold(n: usize, k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        bail!("cross-validation needs at least 2 folds, got {k}");
    }
    if k > n {
        bail!("cannot make {k} folds from {n} rows");
    }

    let base  = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;

    for i in 0..k {
        let size = base + usize::from(i < extra);
        let end  = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n).collect(),
            test:  (start..end).collect(),
        });
        start = end;
    }

    Ok(folds)
}
