// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Split train/test              (Layer 4 - data)
//   Step 2: Fit, or search + refit        (Layer 5 - ml)
//   Step 3: Evaluate on the test split    (Layer 5 - ml)
//   Step 4: Infer the model signature     (Layer 5 - ml)
//   Step 5: Log run + register version    (Layer 6 - infra)
//
// The dataset is loaded by the caller and passed in, so tests
// can feed any table they like. `load_dataset` reads `data_path`
// if set, generates synthetic rows only when `synthetic_rows` is
// set, and otherwise downloads the census table once into
// `data_dir` and reads it from there.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{Dataset, DatasetSource},
    download::{CaliforniaHousing, DEFAULT_DATASET_URL},
    loader::CsvLoader,
    splitter::train_test_split,
    synthetic::SyntheticSource,
};
use crate::domain::run_record::{Metrics, Params};
use crate::infra::metrics::{cv_results_csv, format_params, CV_RESULTS_FILE};
use crate::infra::tracking::{RunSubmission, RunTracker};
use crate::ml::{
    estimator::{EstimatorSpec, FittedModel},
    evaluator::{evaluate, EvaluationMetrics},
    search::{Candidate, ParamGrid, StrategyConfig},
    signature::infer_signature,
    trainer::{train, train_with_search},
};

pub const TRAIN_CONFIG_FILE: &str = "train_config.json";

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one training run needs. Serialisable so it can be
// read from a file and stored with the run it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// California Housing CSV in the MedInc … MedHouseVal layout.
    pub data_path:       Option<String>,
    /// Generate this many rows instead of reading real data.
    pub synthetic_rows:  Option<usize>,
    /// Cache directory for the downloaded census table.
    pub data_dir:        String,
    pub dataset_url:     String,
    pub test_fraction:   f64,
    pub seed:            u64,
    pub estimator:       EstimatorSpec,
    /// When set, the estimator's hyperparameters are searched over this grid.
    pub grid:            Option<ParamGrid>,
    pub strategy:        StrategyConfig,
    /// Training rows used to infer the signature.
    pub signature_rows:  usize,
    pub run_name:        String,
    pub experiment_name: String,
    pub model_name:      String,
    pub tracking_dir:    String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:       None,
            synthetic_rows:  None,
            data_dir:        "data".to_string(),
            dataset_url:     DEFAULT_DATASET_URL.to_string(),
            test_fraction:   0.2,
            seed:            42,
            estimator:       EstimatorSpec::default(),
            grid:            None,
            strategy:        StrategyConfig::default(),
            signature_rows:  5,
            run_name:        "Production-model".to_string(),
            experiment_name: "Imo_production".to_string(),
            model_name:      "Production-model".to_string(),
            tracking_dir:    "mlruns".to_string(),
        }
    }
}

impl TrainConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read training config '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid training config '{}'", path.display()))
    }
}

/// What a finished training run reports back to the caller.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub run_id:      String,
    pub metrics:     EvaluationMetrics,
    pub best_params: Option<Candidate>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig { &self.config }

    /// Load the dataset named by the config.
    pub fn load_dataset(&self) -> Result<Dataset> {
        let cfg = &self.config;
        let source: Box<dyn DatasetSource> = match (&cfg.data_path, cfg.synthetic_rows) {
            (Some(path), _) => Box::new(CsvLoader::new(path)),
            (None, Some(rows)) => {
                tracing::warn!(
                    "Training on {} synthetic rows, not the census data; model '{}' will not reflect real prices",
                    rows,
                    cfg.model_name
                );
                Box::new(SyntheticSource::new(rows, cfg.seed))
            }
            (None, None) => Box::new(CaliforniaHousing::new(&cfg.data_dir, cfg.dataset_url.as_str())),
        };
        source.load()
    }

    /// Run the pipeline on `dataset` and record the result with `tracker`.
    pub fn execute(&self, dataset: &Dataset, tracker: &dyn RunTracker) -> Result<TrainSummary> {
        let cfg        = &self.config;
        let start_time = Utc::now();

        // ── Step 1: Train / test split ────────────────────────────────────────
        let (train_set, test_set) = train_test_split(dataset, cfg.test_fraction, cfg.seed)?;
        tracing::info!("Split: {} train, {} test", train_set.len(), test_set.len());

        // ── Step 2: Fit ───────────────────────────────────────────────────────
        let mut params  = Params::new();
        let mut metrics = Metrics::new();
        let mut artifacts = vec![(TRAIN_CONFIG_FILE.to_string(), serde_json::to_string_pretty(cfg)?)];

        let (model, spec, best_params) = match &cfg.grid {
            Some(grid) => {
                let strategy = cfg.strategy.build();
                let outcome  = train_with_search(
                    &cfg.estimator,
                    grid,
                    strategy.as_ref(),
                    train_set.features(),
                    train_set.targets(),
                )?;
                params.insert("search_strategy".to_string(), strategy.name().to_string());
                params.insert("cv_folds".to_string(), strategy.folds().to_string());
                params.insert("best_params".to_string(), format_params(&outcome.best_params));
                metrics.insert("mean_fit_time".to_string(), outcome.mean_fit_time);
                metrics.insert("mean_score_time".to_string(), outcome.mean_score_time);
                artifacts.push((CV_RESULTS_FILE.to_string(), cv_results_csv(&outcome.report)?));
                (outcome.model, outcome.spec, Some(outcome.best_params))
            }
            None => {
                let model = train(&cfg.estimator, train_set.features(), train_set.targets())?;
                (model, cfg.estimator.clone(), None)
            }
        };
        params.insert("estimator".to_string(), spec.kind().to_string());
        params.extend(spec.params());

        // ── Step 3: Evaluate ──────────────────────────────────────────────────
        let evaluation = evaluate(&model, test_set.features(), test_set.targets())?;
        metrics.extend(evaluation.to_metrics());

        // ── Steps 4-5: Signature, run, registry ───────────────────────────────
        let run_id = self.register(tracker, &model, &train_set, &params, &metrics, artifacts, start_time)?;

        Ok(TrainSummary { run_id, metrics: evaluation, best_params })
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &self,
        tracker:    &dyn RunTracker,
        model:      &FittedModel,
        train_set:  &Dataset,
        params:     &Params,
        metrics:    &Metrics,
        artifacts:  Vec<(String, String)>,
        start_time: chrono::DateTime<Utc>,
    ) -> Result<String> {
        let cfg    = &self.config;
        let sample = train_set.head(cfg.signature_rows.max(1));
        let pred   = model.predict(sample)?;
        let signature = infer_signature(train_set.columns(), sample, pred.view())
            .context("Cannot infer model signature")?;

        tracker.log_run(RunSubmission {
            experiment_name: &cfg.experiment_name,
            run_name:        &cfg.run_name,
            model_name:      &cfg.model_name,
            model,
            signature:       &signature,
            params,
            metrics,
            artifacts,
            start_time,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_record::RegistryRef;
    use crate::domain::traits::ModelRegistry;
    use crate::infra::tracking::FsTrackingStore;
    use crate::ml::estimator::{ParamValue, TreeParams};

    fn small_config() -> TrainConfig {
        TrainConfig {
            synthetic_rows: Some(150),
            estimator:      EstimatorSpec::DecisionTree(TreeParams { max_depth: Some(4), ..TreeParams::default() }),
            ..TrainConfig::default()
        }
    }

    struct FailingTracker;

    impl RunTracker for FailingTracker {
        fn log_run(&self, _submission: RunSubmission<'_>) -> Result<String> {
            anyhow::bail!("tracking server unavailable")
        }
    }

    #[test]
    fn test_default_config_is_production_pipeline() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.test_fraction, 0.2);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.experiment_name, "Imo_production");
        assert_eq!(cfg.run_name, "Production-model");
        assert_eq!(cfg.model_name, "Production-model");
        assert_eq!(cfg.estimator.kind(), "gradient_boosting");
        assert_eq!(cfg.data_path, None);
        assert_eq!(cfg.synthetic_rows, None);
    }

    #[test]
    fn test_default_source_reads_cached_census_table() {
        use crate::data::download::{convert_census_csv, CACHE_FILE};

        let tmp = tempfile::tempdir().unwrap();
        let raw = "longitude,latitude,housing_median_age,total_rooms,total_bedrooms,population,households,median_income,median_house_value,ocean_proximity\n\
                   -122.23,37.88,41.0,880.0,129.0,322.0,126.0,8.3252,452600.0,NEAR BAY\n\
                   -122.22,37.86,21.0,7099.0,1106.0,2401.0,1138.0,8.3014,358500.0,NEAR BAY\n";
        fs::write(tmp.path().join(CACHE_FILE), convert_census_csv(raw).unwrap()).unwrap();

        let cfg = TrainConfig {
            data_dir:    tmp.path().to_string_lossy().into_owned(),
            dataset_url: "http://127.0.0.1:9/unreachable.csv".to_string(),
            ..TrainConfig::default()
        };
        let dataset = TrainUseCase::new(cfg).load_dataset().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.features().row(1)[0], 8.3014);
    }

    #[test]
    fn test_config_file_fills_defaults() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("train.json");
        fs::write(
            &path,
            r#"{"estimator": {"kind": "ridge", "alpha": 0.5},
                "grid": {"alpha": [0.1, 1.0]},
                "strategy": {"kind": "grid", "folds": 4}}"#,
        )
        .unwrap();
        let cfg = TrainConfig::from_file(&path).unwrap();
        assert_eq!(cfg.estimator.params()["alpha"], "0.5");
        assert_eq!(cfg.strategy, StrategyConfig::Grid { folds: 4 });
        assert_eq!(cfg.grid.unwrap().size(), 2);
        assert_eq!(cfg.seed, 42);
        assert!(TrainConfig::from_file(tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_execute_registers_a_servable_model() {
        let tmp     = tempfile::tempdir().unwrap();
        let store   = FsTrackingStore::new(tmp.path());
        let cfg     = small_config();
        let uc      = TrainUseCase::new(cfg.clone());
        let dataset = uc.load_dataset().unwrap();

        let summary = uc.execute(&dataset, &store).unwrap();
        assert!(summary.metrics.mean_squared_error.is_finite());
        assert!(summary.best_params.is_none());

        let run = store.load_run(&cfg.experiment_name, &summary.run_id).unwrap();
        assert_eq!(run.params["estimator"], "decision_tree");
        assert_eq!(run.params["max_depth"], "4");
        for key in ["mean_squared_error", "mean_absolute_error", "r2"] {
            assert!(run.metrics.contains_key(key), "{key}");
        }
        let saved = store.artifacts(&cfg.experiment_name, &summary.run_id).load_text(TRAIN_CONFIG_FILE).unwrap();
        assert_eq!(serde_json::from_str::<TrainConfig>(&saved).unwrap(), cfg);

        let model = store.resolve(&RegistryRef::new(&cfg.model_name, 1)).unwrap();
        assert_eq!(model.input_columns(), dataset.columns());
    }

    #[test]
    fn test_search_logs_timings_and_cv_results() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let cfg   = TrainConfig {
            grid: Some(ParamGrid::new().with("max_depth", vec![ParamValue::Int(2), ParamValue::Int(5)])),
            ..small_config()
        };
        let uc      = TrainUseCase::new(cfg.clone());
        let dataset = uc.load_dataset().unwrap();

        let summary = uc.execute(&dataset, &store).unwrap();
        let best    = summary.best_params.unwrap();
        let run     = store.load_run(&cfg.experiment_name, &summary.run_id).unwrap();
        assert!(run.metrics.contains_key("mean_fit_time"));
        assert!(run.metrics.contains_key("mean_score_time"));
        assert_eq!(run.params["search_strategy"], "grid_search");
        assert_eq!(run.params["max_depth"], best["max_depth"].to_string());

        let csv = store.artifacts(&cfg.experiment_name, &summary.run_id).load_text(CV_RESULTS_FILE).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_tracker_failure_propagates() {
        let uc      = TrainUseCase::new(small_config());
        let dataset = uc.load_dataset().unwrap();
        let err     = uc.execute(&dataset, &FailingTracker).unwrap_err();
        assert!(err.to_string().contains("tracking server unavailable"));
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = FsTrackingStore::new(tmp.path());
        let uc    = TrainUseCase::new(small_config());
        let data  = uc.load_dataset().unwrap();
        let a = uc.execute(&data, &store).unwrap();
        let b = uc.execute(&data, &store).unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert_ne!(a.run_id, b.run_id);
    }
}
