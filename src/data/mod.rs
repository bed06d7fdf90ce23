// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw table and the estimator:
//
//   CsvLoader / CaliforniaHousing / SyntheticSource → Dataset
//       │
//       ▼
//   train_test_split            → (train, test), seeded
//       │
//       ▼
//   k_fold                      → CV folds over the train rows
//
// Each module is responsible for exactly one step.

/// Row-aligned features + targets
pub mod dataset;

/// Reads the California Housing CSV
pub mod loader;

/// Downloads and caches the census table as a loader-ready CSV
pub mod download;

/// Seeded generator of California-like rows
pub mod synthetic;

/// Seeded train/test split and k-fold partitioning
pub mod splitter;
