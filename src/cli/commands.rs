// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `serve` and `form`
// and all their configurable flags.
//
// Each Args struct converts into its application-layer config
// via `From`, so the application layer never sees clap types.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::application::{
    form_use_case::FormConfig,
    serve_use_case::ServeConfig,
    train_use_case::TrainConfig,
};

/// The three top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train, evaluate and register a housing price model
    Train(TrainArgs),

    /// Serve a registered model over HTTP
    Serve(ServeArgs),

    /// Interactive form that queries a running prediction service
    Form(FormArgs),
}

/// Arguments for the `train` command.
/// Flags given here override the same settings in `--config`.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON training config (estimator, grid, strategy, names)
    #[arg(long)]
    pub config: Option<String>,

    /// California Housing CSV to train on
    #[arg(long, conflicts_with = "synthetic_rows")]
    pub data: Option<String>,

    /// Train on this many generated rows instead of real data
    #[arg(long)]
    pub synthetic_rows: Option<usize>,

    /// Where the downloaded census table is cached
    #[arg(long, env = "HOUSING_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Root directory of the tracking store
    #[arg(long, env = "HOUSING_TRACKING_DIR")]
    pub tracking_dir: Option<String>,

    /// Experiment the run is logged under
    #[arg(long)]
    pub experiment_name: Option<String>,

    /// Name of the run
    #[arg(long)]
    pub run_name: Option<String>,

    /// Registry name the model is registered under
    #[arg(long)]
    pub model_name: Option<String>,

    /// Share of rows held out for evaluation
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Seed for the train/test split and the synthetic generator
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    /// Start from `--config` (or the defaults) and apply the flags on top.
    pub fn into_config(self) -> Result<TrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => TrainConfig::from_file(path)?,
            None => TrainConfig::default(),
        };
        if let Some(data) = self.data {
            cfg.data_path = Some(data);
            cfg.synthetic_rows = None;
        }
        if let Some(rows) = self.synthetic_rows {
            cfg.data_path = None;
            cfg.synthetic_rows = Some(rows);
        }
        if let Some(dir) = self.data_dir {
            cfg.data_dir = dir;
        }
        if let Some(dir) = self.tracking_dir {
            cfg.tracking_dir = dir;
        }
        if let Some(name) = self.experiment_name {
            cfg.experiment_name = name;
        }
        if let Some(name) = self.run_name {
            cfg.run_name = name;
        }
        if let Some(name) = self.model_name {
            cfg.model_name = name;
        }
        if let Some(fraction) = self.test_fraction {
            cfg.test_fraction = fraction;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        Ok(cfg)
    }
}

/// Arguments for the `serve` command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Root directory of the tracking store
    #[arg(long, env = "HOUSING_TRACKING_DIR", default_value = "mlruns")]
    pub tracking_dir: String,

    /// Registered model name
    #[arg(long, default_value = "Production-model")]
    pub model_name: String,

    /// Registered model version
    #[arg(long, default_value_t = 1)]
    pub model_version: u32,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8000)]
    pub port: u16,
}

impl From<ServeArgs> for ServeConfig {
    fn from(a: ServeArgs) -> Self {
        ServeConfig {
            tracking_dir:  a.tracking_dir,
            model_name:    a.model_name,
            model_version: a.model_version,
            host:          a.host,
            port:          a.port,
        }
    }
}

/// Arguments for the `form` command
#[derive(Args, Debug)]
pub struct FormArgs {
    /// Base URL of the prediction service
    #[arg(long, default_value = "http://localhost:8000")]
    pub url: String,

    /// Multiplier applied to the model output before display
    #[arg(long, default_value_t = 100_000.0)]
    pub display_scale: f64,
}

impl From<FormArgs> for FormConfig {
    fn from(a: FormArgs) -> Self {
        FormConfig { url: a.url, display_scale: a.display_scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["housing-price", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                let cfg: ServeConfig = args.into();
                assert_eq!(cfg.model_name, "Production-model");
                assert_eq!(cfg.model_version, 1);
                assert_eq!(cfg.port, 8000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_form_display_scale() {
        let cli = Cli::try_parse_from(["housing-price", "form", "--display-scale", "1"]).unwrap();
        match cli.command {
            Commands::Form(args) => {
                let cfg: FormConfig = args.into();
                assert_eq!(cfg.display_scale, 1.0);
                assert_eq!(cfg.url, "http://localhost:8000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_train_flags_override_config_file() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("train.json");
        std::fs::write(&path, r#"{"data_path": "housing.csv", "run_name": "from-file", "seed": 7}"#).unwrap();

        let cli = Cli::try_parse_from([
            "housing-price", "train",
            "--config", path.to_str().unwrap(),
            "--synthetic-rows", "300",
            "--run-name", "from-flag",
            "--tracking-dir", "store",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.data_path, None);
        assert_eq!(cfg.synthetic_rows, Some(300));
        assert_eq!(cfg.run_name, "from-flag");
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.tracking_dir, "store");
        assert_eq!(cfg.model_name, "Production-model");
    }

    #[test]
    fn test_train_defaults_to_census_download() {
        let cli = Cli::try_parse_from(["housing-price", "train", "--data-dir", "cache"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.data_path, None);
        assert_eq!(cfg.synthetic_rows, None);
        assert_eq!(cfg.data_dir, "cache");
    }

    #[test]
    fn test_data_flag_clears_synthetic_rows_from_file() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("train.json");
        std::fs::write(&path, r#"{"synthetic_rows": 500}"#).unwrap();
        let cli = Cli::try_parse_from([
            "housing-price", "train", "--config", path.to_str().unwrap(), "--data", "housing.csv",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.data_path.as_deref(), Some("housing.csv"));
        assert_eq!(cfg.synthetic_rows, None);
    }

    #[test]
    fn test_train_data_conflicts_with_synthetic() {
        let res = Cli::try_parse_from(["housing-price", "train", "--data", "a.csv", "--synthetic-rows", "10"]);
        assert!(res.is_err());
    }
}
