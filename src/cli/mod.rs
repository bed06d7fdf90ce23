// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train` — fits, evaluates and registers a model
//   2. `serve` — serves a registered model over HTTP
//   3. `form`  — terminal form that calls the service

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, FormArgs, ServeArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "housing-price",
    version,
    about = "Train, register and serve a California Housing price model."
)]
pub struct Cli {
    /// The subcommand to run (train, serve or form)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Serve(args) => run_serve(args),
            Commands::Form(args)  => run_form(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;
    use crate::infra::tracking::FsTrackingStore;

    let use_case = TrainUseCase::new(args.into_config()?);
    let cfg      = use_case.config();
    tracing::info!(
        "Training '{}' in experiment '{}'",
        cfg.run_name,
        cfg.experiment_name
    );

    let dataset = use_case.load_dataset()?;
    let store   = FsTrackingStore::new(&cfg.tracking_dir);
    let summary = use_case.execute(&dataset, &store)?;

    println!("Run {} registered as '{}'.", summary.run_id, cfg.model_name);
    println!(
        "  mean_squared_error  = {:.5}\n  mean_absolute_error = {:.5}\n  r2                  = {:.4}",
        summary.metrics.mean_squared_error,
        summary.metrics.mean_absolute_error,
        summary.metrics.r2,
    );
    Ok(())
}

fn run_serve(args: ServeArgs) -> Result<()> {
    use crate::application::serve_use_case::ServeUseCase;

    ServeUseCase::new(args.into()).execute()
}

fn run_form(args: FormArgs) -> Result<()> {
    use crate::application::form_use_case::FormUseCase;

    FormUseCase::new(args.into()).execute()
}
