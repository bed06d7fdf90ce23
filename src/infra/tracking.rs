// ============================================================
// Layer 6 — File-Backed Tracking Store
// ============================================================
// Persists runs and a model registry under one root directory:
//
//   <root>/
//     experiments/<experiment>/meta.json
//     experiments/<experiment>/runs/<run_id>/
//       meta.json  params.json  metrics.json
//       artifacts/model/{model,signature}.json
//       artifacts/{train_config.json,cv_results.csv}
//     models/<name>/<version>/version.json
//
// A run is written into a hidden staging directory and renamed
// into place once complete, so readers never see half a run.
// Versions are claimed with `create_dir`, which fails if the
// directory already exists; two concurrent registrations of the
// same name therefore get distinct numbers. If registering the
// version fails the run directory is removed again.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run_record::{Metrics, ModelSignature, ModelVersion, Params, RegistryRef, RunRecord, RunStatus};
use crate::domain::traits::{Model, ModelRegistry};
use crate::infra::artifact_store::{ArtifactStore, MODEL_DIR};
use crate::ml::estimator::FittedModel;
use crate::ml::inferencer::Inferencer;

const EXPERIMENTS: &str = "experiments";
const MODELS: &str      = "models";
const RUNS: &str        = "runs";
const ARTIFACTS: &str   = "artifacts";
const META_FILE: &str   = "meta.json";
const VERSION_FILE: &str = "version.json";
const MAX_VERSION_ATTEMPTS: usize = 16;

// ─── RunTracker ───────────────────────────────────────────────────────────────
/// Everything that gets written for one training run.
pub struct RunSubmission<'a> {
    pub experiment_name: &'a str,
    pub run_name:        &'a str,
    pub model_name:      &'a str,
    pub model:           &'a FittedModel,
    pub signature:       &'a ModelSignature,
    pub params:          &'a Params,
    pub metrics:         &'a Metrics,
    /// Extra files stored beside the model: (file name, contents).
    pub artifacts:       Vec<(String, String)>,
    pub start_time:      DateTime<Utc>,
}

/// Persists a run and registers its model under a new version.
pub trait RunTracker {
    /// Returns the new run's identifier.
    fn log_run(&self, submission: RunSubmission<'_>) -> Result<String>;
}

// ─── FsTrackingStore ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMeta {
    pub name:       String,
    pub created_at: DateTime<Utc>,
}

pub struct FsTrackingStore {
    root: PathBuf,
}

impl FsTrackingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join(EXPERIMENTS).join(experiment)
    }

    fn run_dir(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment).join(RUNS).join(run_id)
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(MODELS).join(name)
    }

    /// Create the experiment if it does not exist yet.
    pub fn ensure_experiment(&self, name: &str) -> Result<()> {
        check_name("experiment", name)?;
        let dir  = self.experiment_dir(name);
        let meta = dir.join(META_FILE);
        if meta.exists() {
            return Ok(());
        }
        fs::create_dir_all(dir.join(RUNS))
            .with_context(|| format!("Cannot create experiment directory '{}'", dir.display()))?;
        write_json(&meta, &ExperimentMeta { name: name.to_string(), created_at: Utc::now() })?;
        tracing::info!("Created experiment '{}'", name);
        Ok(())
    }

    pub fn load_run(&self, experiment: &str, run_id: &str) -> Result<RunRecord> {
        read_json(&self.run_dir(experiment, run_id).join(META_FILE))
    }

    /// Artifact directory of a run.
    #[cfg(test)]
    pub fn artifacts(&self, experiment: &str, run_id: &str) -> ArtifactStore {
        ArtifactStore::open(self.run_dir(experiment, run_id).join(ARTIFACTS))
    }

    pub fn load_version(&self, reference: &RegistryRef) -> Result<ModelVersion> {
        check_name("model", &reference.name)?;
        let path = self.model_dir(&reference.name).join(reference.version.to_string()).join(VERSION_FILE);
        read_json(&path).with_context(|| format!("Model {reference} is not registered"))
    }

    /// Registered version numbers of `name`, ascending.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.model_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut versions: Vec<u32> = fs::read_dir(&dir)
            .with_context(|| format!("Cannot list '{}'", dir.display()))?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    fn write_run(&self, staging: &Path, record: &RunRecord, submission: &RunSubmission<'_>) -> Result<()> {
        let store = ArtifactStore::create(staging.join(ARTIFACTS))?;
        let columns = submission.signature.input_names();
        store.save_model(&columns, submission.model)?;
        store.save_signature(submission.signature)?;
        for (name, contents) in &submission.artifacts {
            store.save_text(name, contents)?;
        }
        write_json(&staging.join("params.json"), submission.params)?;
        write_json(&staging.join("metrics.json"), submission.metrics)?;
        write_json(&staging.join(META_FILE), record)?;
        Ok(())
    }

    fn register_version(&self, record: &RunRecord, model_name: &str) -> Result<ModelVersion> {
        let dir = self.model_dir(model_name);
        fs::create_dir_all(&dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;

        for _ in 0..MAX_VERSION_ATTEMPTS {
            let next = self.versions(model_name)?.last().map_or(1, |v| v + 1);
            let version_dir = dir.join(next.to_string());
            match fs::create_dir(&version_dir) {
                Ok(()) => {
                    let version = ModelVersion {
                        name:            model_name.to_string(),
                        version:         next,
                        run_id:          record.run_id.clone(),
                        experiment_name: record.experiment_name.clone(),
                        source:          format!(
                            "{EXPERIMENTS}/{}/{RUNS}/{}/{ARTIFACTS}",
                            record.experiment_name, record.run_id
                        ),
                        created_at:      Utc::now(),
                    };
                    if let Err(e) = write_json(&version_dir.join(VERSION_FILE), &version) {
                        let _ = fs::remove_dir_all(&version_dir);
                        return Err(e);
                    }
                    return Ok(version);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("Version {} of '{}' was taken, retrying", next, model_name);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Cannot create '{}'", version_dir.display()));
                }
            }
        }
        bail!("Could not claim a new version of '{model_name}' after {MAX_VERSION_ATTEMPTS} attempts")
    }
}

impl RunTracker for FsTrackingStore {
    fn log_run(&self, submission: RunSubmission<'_>) -> Result<String> {
        check_name("run", submission.run_name)?;
        check_name("model", submission.model_name)?;
        self.ensure_experiment(submission.experiment_name)?;

        let run_id = Uuid::new_v4().simple().to_string();
        let record = RunRecord {
            run_id:          run_id.clone(),
            run_name:        submission.run_name.to_string(),
            experiment_name: submission.experiment_name.to_string(),
            params:          submission.params.clone(),
            metrics:         submission.metrics.clone(),
            artifact_path:   format!("{ARTIFACTS}/{MODEL_DIR}"),
            status:          RunStatus::Finished,
            start_time:      submission.start_time,
            end_time:        Utc::now(),
        };

        let runs    = self.experiment_dir(submission.experiment_name).join(RUNS);
        let staging = runs.join(format!(".staging-{run_id}"));
        let final_dir = runs.join(&run_id);

        if let Err(e) = self.write_run(&staging, &record, &submission) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.context(format!("Failed to write run '{}'", submission.run_name)));
        }
        publish(&staging, &final_dir)?;

        match self.register_version(&record, submission.model_name) {
            Ok(version) => {
                tracing::info!(
                    "Logged run {} ('{}') and registered {}",
                    run_id,
                    submission.run_name,
                    RegistryRef::new(&version.name, version.version)
                );
                Ok(run_id)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&final_dir);
                Err(e.context(format!("Failed to register model '{}'", submission.model_name)))
            }
        }
    }
}

impl ModelRegistry for FsTrackingStore {
    fn resolve(&self, reference: &RegistryRef) -> Result<Arc<dyn Model>> {
        let version  = self.load_version(reference)?;
        let run      = self.load_run(&version.experiment_name, &version.run_id)
            .with_context(|| format!("Run behind {reference} is missing"))?;
        let store    = ArtifactStore::open(self.root.join(&version.source));
        let artifact = store.load_model().with_context(|| format!("Cannot load {reference}"))?;
        let signature = store.load_signature().with_context(|| format!("Cannot load signature of {reference}"))?;

        if signature.input_names() != artifact.columns {
            bail!(
                "{reference}: signature inputs {:?} disagree with model columns {:?}",
                signature.input_names(),
                artifact.columns
            );
        }

        tracing::info!("Resolved {} (run '{}', {})", reference, run.run_name, run.run_id);
        Ok(Arc::new(Inferencer::new(artifact.model, artifact.columns)?))
    }
}

/// Rename a complete staging directory into place, removing it on failure.
fn publish(staging: &Path, final_dir: &Path) -> Result<()> {
    if let Err(e) = fs::rename(staging, final_dir) {
        let _ = fs::remove_dir_all(staging);
        return Err(e).with_context(|| format!("Cannot move run into '{}'", final_dir.display()));
    }
    Ok(())
}

/// Names become directory names.
fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(|c| c == '/' || c == '\\') {
        bail!("Invalid {what} name '{name}'");
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("'{}' is malformed", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_record::{FeatureRecord, MODEL_COLUMNS};
    use crate::ml::estimator::{EstimatorSpec, TreeParams};
    use crate::ml::signature::infer_signature;
    use ndarray::{Array1, Array2};

    struct Fixture {
        model:     FittedModel,
        signature: ModelSignature,
        params:    Params,
        metrics:   Metrics,
    }

    fn fixture() -> Fixture {
        let x = Array2::from_shape_fn((20, 8), |(i, j)| (i * (j + 1)) as f64 * 0.1);
        let y: Array1<f64> = x.column(0).mapv(|v| v + 1.0);
        let spec  = EstimatorSpec::DecisionTree(TreeParams { max_depth: Some(3), ..TreeParams::default() });
        let model = spec.fit(x.view(), y.view()).unwrap();
        let cols: Vec<String> = MODEL_COLUMNS.iter().map(|c| c.to_string()).collect();
        let pred  = model.predict(x.view()).unwrap();
        Fixture {
            signature: infer_signature(&cols, x.view(), pred.view()).unwrap(),
            model,
            params:    spec.params(),
            metrics:   Metrics::from([("r2".to_string(), 0.9)]),
        }
    }

    fn submit<'a>(f: &'a Fixture, model_name: &'a str) -> RunSubmission<'a> {
        RunSubmission {
            experiment_name: "Imo_production",
            run_name:        "Production-model",
            model_name,
            model:           &f.model,
            signature:       &f.signature,
            params:          &f.params,
            metrics:         &f.metrics,
            artifacts:       vec![("cv_results.csv".to_string(), "params\n".to_string())],
            start_time:      Utc::now(),
        }
    }

    #[test]
    fn test_log_run_writes_run_and_version_one() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();

        let run_id = store.log_run(submit(&f, "Production-model")).unwrap();
        let record = store.load_run("Imo_production", &run_id).unwrap();
        assert_eq!(record.run_name, "Production-model");
        assert_eq!(record.status, RunStatus::Finished);
        assert_eq!(record.params, f.params);
        assert_eq!(record.metrics["r2"], 0.9);
        assert!(record.end_time >= record.start_time);

        let version = store.load_version(&RegistryRef::new("Production-model", 1)).unwrap();
        assert_eq!(version.run_id, run_id);
        assert_eq!(store.artifacts("Imo_production", &run_id).load_text("cv_results.csv").unwrap(), "params\n");
        assert!(tmp.path().join("experiments/Imo_production/meta.json").exists());
    }

    #[test]
    fn test_versions_increment_per_model_name() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();

        let first  = store.log_run(submit(&f, "Production-model")).unwrap();
        let second = store.log_run(submit(&f, "Production-model")).unwrap();
        store.log_run(submit(&f, "Other-model")).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.versions("Production-model").unwrap(), vec![1, 2]);
        assert_eq!(store.versions("Other-model").unwrap(), vec![1]);
        assert_eq!(store.load_version(&RegistryRef::new("Production-model", 2)).unwrap().run_id, second);
    }

    #[test]
    fn test_resolve_returns_working_model() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();
        store.log_run(submit(&f, "Production-model")).unwrap();

        let model  = store.resolve(&RegistryRef::new("Production-model", 1)).unwrap();
        assert_eq!(model.input_columns(), MODEL_COLUMNS.map(String::from).as_slice());
        let values = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0];
        let row    = Array1::from(values.to_vec());
        let expect = f.model.predict_row(row.view()).unwrap();
        assert_eq!(model.predict(&FeatureRecord::from_values(values).to_frame()).unwrap(), expect);
    }

    #[test]
    fn test_resolve_unknown_version_fails() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        assert!(store.resolve(&RegistryRef::new("Production-model", 1)).is_err());
        let f = fixture();
        store.log_run(submit(&f, "Production-model")).unwrap();
        assert!(store.resolve(&RegistryRef::new("Production-model", 7)).is_err());
    }

    #[test]
    fn test_failed_registration_leaves_no_run() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();
        // A file where the models directory should be makes registration fail.
        fs::write(tmp.path().join(MODELS), "not a directory").unwrap();

        assert!(store.log_run(submit(&f, "Production-model")).is_err());
        let runs = tmp.path().join("experiments/Imo_production/runs");
        assert_eq!(fs::read_dir(runs).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_publish_removes_staging() {
        let tmp     = tempfile::tempdir().unwrap();
        let staging = tmp.path().join(".staging-abc");
        let taken   = tmp.path().join("abc");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join(META_FILE), "{}").unwrap();
        // A non-empty directory cannot be replaced by rename.
        fs::create_dir_all(&taken).unwrap();
        fs::write(taken.join(META_FILE), "{}").unwrap();

        assert!(publish(&staging, &taken).is_err());
        assert!(!staging.exists());
        assert!(taken.join(META_FILE).exists());
    }

    #[test]
    fn test_resolve_fails_when_run_is_gone() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();
        let run_id = store.log_run(submit(&f, "Production-model")).unwrap();
        fs::remove_dir_all(tmp.path().join("experiments/Imo_production/runs").join(&run_id)).unwrap();
        assert!(store.resolve(&RegistryRef::new("Production-model", 1)).is_err());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let f     = fixture();
        assert!(store.log_run(submit(&f, "../escape")).is_err());
        assert!(store.ensure_experiment("").is_err());
    }
}
