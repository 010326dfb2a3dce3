//! ChurnForge: turnover prediction and behavioral clustering over HR records
//!
//! This is the main entrypoint that builds artifacts (preprocess, train,
//! cluster) and serves predictions and cluster insights from them.

use anyhow::{Context, Result};
use churnforge::cli::{validate_upload, Args, Command};
use churnforge::pipeline::{run_clustering, run_preprocess, run_training};
use churnforge::{read_csv_bytes, PredictionRequest, ServingContext};
use clap::Parser;
use serde::Serialize;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let paths = args.artifacts.paths();
    let start_time = Instant::now();

    match &args.command {
        Command::Preprocess => {
            let report = run_preprocess(&paths)?;
            print_json(&serde_json::json!({
                "dropped": report.dropped,
                "encoded": report.encoded.iter().map(|(name, _)| name).collect::<Vec<_>>(),
                "scaled": report.scaled,
            }))?;
        }
        Command::Train { max_iters, seed } => {
            let outcome = run_training(&paths, *max_iters, *seed)?;
            print_json(&serde_json::json!({
                "train_rows": outcome.train_rows,
                "test_rows": outcome.test_rows,
                "metrics": outcome.metrics,
                "classification_report": outcome.report,
            }))?;
        }
        command @ Command::Cluster { .. } => {
            let config = command
                .clustering_config()
                .context("cluster settings")?;
            let outcome = run_clustering(&paths, &config)?;
            print_json(&serde_json::json!({
                "optimal_k": outcome.selection.optimal_k,
                "cost_curve": outcome.selection.cost_curve,
                "cluster_sizes": outcome.cluster_sizes,
                "profiles": outcome.profiles,
            }))?;
        }
        Command::Predict { input, sample } => {
            let context = ServingContext::load(&paths);
            let request = match input {
                Some(path) if !*sample => {
                    validate_upload(path)?;
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    PredictionRequest::Upload(read_csv_bytes(bytes)?)
                }
                _ => PredictionRequest::Sample,
            };
            let batch = context.predict(&request)?;
            print_json(&batch.to_json()?)?;
        }
        Command::Profiles => {
            let context = ServingContext::load(&paths);
            print_json(&context.cluster_insights()?)?;
        }
        Command::Overview => {
            let context = ServingContext::load(&paths);
            print_json(&context.dataset_overview()?)?;
        }
        Command::Metrics => {
            let context = ServingContext::load(&paths);
            print_json(&context.model_metrics()?)?;
        }
        Command::Health => {
            let context = ServingContext::load(&paths);
            print_json(&context.health())?;
        }
    }

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}

/// Logs go to stderr so stdout carries only the JSON result
fn init_tracing(verbose: bool) {
    let default = if verbose { "churnforge=debug" } else { "churnforge=info" };
    let filter =
        EnvFilter::try_from_env("CHURNFORGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
