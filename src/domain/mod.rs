// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain structs and traits describing what the system works
// with: feature records, run records, registry references,
// and the traits other layers implement.
//
// Rules for this layer:
//   - NO file I/O or network calls
//   - NO HTTP types

/// The eight-field prediction input and its single-row frame
pub mod feature_record;

/// Run, signature and registry reference types
pub mod run_record;

/// Core abstractions (traits) that other layers implement
pub mod traits;
