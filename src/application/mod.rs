// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal each: training, serving, or the form client.
//
// Rules for this layer:
//   - No model math here (that's Layer 5)
//   - No direct file layout knowledge (that's Layer 6)
//   - Only workflow coordination
//
// The prediction service and the form client own their HTTP
// boundary types, since nothing else speaks HTTP.

// The training, evaluation and registration workflow
pub mod train_use_case;

// The prediction service (axum)
pub mod serve_use_case;

// The terminal form client (blocking reqwest)
pub mod form_use_case;
