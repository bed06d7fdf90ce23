// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores the files kept beside a run.
//
// Layout of one artifact directory:
//   artifacts/
//     model/
//       model.json       ← column names + fitted model
//       signature.json   ← inferred input/output schema
//     train_config.json  ← the config the run was trained with
//     cv_results.csv     ← per-candidate search scores
//
// The model is plain serde JSON; floats are written with
// round-trip precision, so a reloaded model predicts exactly
// what the original did.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::run_record::ModelSignature;
use crate::ml::estimator::FittedModel;

pub const MODEL_DIR: &str      = "model";
pub const MODEL_FILE: &str     = "model.json";
pub const SIGNATURE_FILE: &str = "signature.json";

/// On-disk form of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub columns: Vec<String>,
    pub model:   FittedModel,
}

/// Reads and writes the files of one artifact directory.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates the directory (and `model/` under it) if missing.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(dir.join(MODEL_DIR))
            .with_context(|| format!("Cannot create artifact directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Opens an existing directory without touching disk.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save_model(&self, columns: &[String], model: &FittedModel) -> Result<()> {
        let artifact = ModelArtifact { columns: columns.to_vec(), model: model.clone() };
        self.write_json(&self.dir.join(MODEL_DIR).join(MODEL_FILE), &artifact)
    }

    pub fn load_model(&self) -> Result<ModelArtifact> {
        self.read_json(&self.dir.join(MODEL_DIR).join(MODEL_FILE))
    }

    pub fn save_signature(&self, signature: &ModelSignature) -> Result<()> {
        self.write_json(&self.dir.join(MODEL_DIR).join(SIGNATURE_FILE), signature)
    }

    pub fn load_signature(&self) -> Result<ModelSignature> {
        self.read_json(&self.dir.join(MODEL_DIR).join(SIGNATURE_FILE))
    }

    /// Write a free-form artifact file such as `cv_results.csv`.
    pub fn save_text(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, contents).with_context(|| format!("Cannot write artifact '{}'", path.display()))?;
        tracing::debug!("Saved artifact '{}'", path.display());
        Ok(())
    }

    pub fn load_text(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        fs::read_to_string(&path).with_context(|| format!("Cannot read artifact '{}'", path.display()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}'. Has the model been trained and registered?", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("'{}' is not a valid artifact", path.display()))
    }
}
