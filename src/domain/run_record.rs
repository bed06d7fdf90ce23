// ============================================================
// Layer 3 — Run Record and Registry Types
// ============================================================
// Plain data describing what the tracking store persists:
//   - RunRecord      one immutable training execution
//   - ModelSignature input/output schema stored with a model
//   - RegistryRef    (model name, version) lookup key
//   - ModelVersion   one registered version of a named model

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hyperparameters as logged: name → display string.
pub type Params = BTreeMap<String, String>;

/// Numeric run metrics: name → value.
pub type Metrics = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Finished,
}

/// One immutable record of a single training execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id:          String,
    pub run_name:        String,
    pub experiment_name: String,
    pub params:          Params,
    pub metrics:         Metrics,
    /// Path of the model artifact, relative to the run directory.
    pub artifact_path:   String,
    pub status:          RunStatus,
    pub start_time:      DateTime<Utc>,
    pub end_time:        DateTime<Utc>,
}

/// A named, typed column in a model signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub dtype: String,
}

/// Input and output schema inferred from training rows and predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs:  Vec<ColumnSpec>,
    pub outputs: Vec<ColumnSpec>,
}

impl ModelSignature {
    /// Input column names in order; unnamed inputs are skipped.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().filter_map(|c| c.name.clone()).collect()
    }
}

/// Lookup key for a registered model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryRef {
    pub name:    String,
    pub version: u32,
}

impl RegistryRef {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self { name: name.into(), version }
    }
}

impl fmt::Display for RegistryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "models:/{}/{}", self.name, self.version)
    }
}

/// One registered version, pointing back at the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name:            String,
    pub version:         u32,
    pub run_id:          String,
    pub experiment_name: String,
    /// Artifact directory, relative to the tracking root.
    pub source:          String,
    pub created_at:      DateTime<Utc>,
}
