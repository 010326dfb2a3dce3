//! Offline pipelines producing the artifacts the serving context loads

use crate::classifier::{train, TrainingOutcome};
use crate::config::{ArtifactPaths, ClusteringConfig, TARGET_COLUMN};
use crate::data::{load_csv, numeric_matrix, write_csv};
use crate::error::CoreError;
use crate::model::fit_kmeans;
use crate::preprocess::{preprocess, PreprocessReport};
use crate::profile::{profile, profiles_to_frame, ClusterProfile};
use crate::selection::{select_k, KSelection};
use anyhow::Context;
use polars::prelude::*;
use tracing::{info, warn};

/// Column holding the cluster id in the assignments artifact
pub const ASSIGNMENT_COLUMN: &str = "Cluster";

/// Result of the clustering pipeline
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    pub selection: KSelection,
    pub assignments: Vec<usize>,
    /// Rows per cluster id, including clusters the fit left empty
    pub cluster_sizes: Vec<usize>,
    /// Absent when the original dataset is not available
    pub profiles: Option<Vec<ClusterProfile>>,
}

/// Raw dataset → preprocessed dataset
pub fn run_preprocess(paths: &ArtifactPaths) -> crate::Result<PreprocessReport> {
    let raw = load_csv(&paths.original)
        .with_context(|| format!("loading {}", paths.original.display()))?;
    let (processed, report) = preprocess(&raw, TARGET_COLUMN)?;
    write_csv(&processed, &paths.preprocessed)?;
    info!(path = %paths.preprocessed.display(), "Preprocessed data saved");
    Ok(report)
}

/// Preprocessed dataset → model artifact and held-out metrics
pub fn run_training(
    paths: &ArtifactPaths,
    max_iterations: u64,
    seed: u64,
) -> crate::Result<TrainingOutcome> {
    let frame = load_csv(&paths.preprocessed)
        .with_context(|| format!("loading {}", paths.preprocessed.display()))?;
    anyhow::ensure!(
        frame.get_column_names().contains(&TARGET_COLUMN),
        "preprocessed data has no '{}' column",
        TARGET_COLUMN
    );

    let outcome = train(&frame, TARGET_COLUMN, max_iterations, seed)?;
    outcome.model.save(&paths.model)?;
    write_csv(&outcome.metrics.to_frame()?, &paths.model_metrics)?;
    write_csv(&outcome.report.to_frame()?, &paths.classification_report)?;
    info!(path = %paths.model.display(), "Model saved");
    Ok(outcome)
}

/// Preprocessed dataset → chosen k, assignments and cluster profiles
pub fn run_clustering(
    paths: &ArtifactPaths,
    config: &ClusteringConfig,
) -> crate::Result<ClusteringOutcome> {
    let frame = load_csv(&paths.preprocessed)
        .with_context(|| format!("loading {}", paths.preprocessed.display()))?;
    let features_frame = if frame.get_column_names().contains(&TARGET_COLUMN) {
        frame.drop(TARGET_COLUMN)?
    } else {
        frame
    };
    let features = numeric_matrix(&features_frame)?;

    let selection = select_k(&features, config)?;
    let model = fit_kmeans(&features, selection.optimal_k, config)?;
    let assignments: Vec<usize> = model.labels.to_vec();
    let cluster_sizes = model.cluster_sizes();

    let mut clustered = features_frame.clone();
    clustered.with_column(Series::new(
        ASSIGNMENT_COLUMN,
        assignments.iter().map(|&c| c as i64).collect::<Vec<_>>(),
    ))?;
    write_csv(&clustered, &paths.cluster_assignments)?;

    let profiles = if paths.original.exists() {
        let original = load_csv(&paths.original)?;
        let profiles = profile(&assignments, &original)?;
        check_profile_sizes(&profiles, &cluster_sizes)?;
        write_csv(&profiles_to_frame(&profiles)?, &paths.cluster_profiles)?;
        Some(profiles)
    } else {
        warn!(
            path = %paths.original.display(),
            "Original dataset not found, skipping cluster profiles"
        );
        None
    };

    info!(
        optimal_k = selection.optimal_k,
        inertia = model.inertia,
        "Clustering analysis completed"
    );
    Ok(ClusteringOutcome {
        selection,
        assignments,
        cluster_sizes,
        profiles,
    })
}

/// Profiles must cover exactly the non-empty clusters of the fit, with the same sizes
fn check_profile_sizes(profiles: &[ClusterProfile], cluster_sizes: &[usize]) -> crate::Result<()> {
    let expected: Vec<(usize, usize)> = cluster_sizes
        .iter()
        .enumerate()
        .filter(|&(_, &size)| size > 0)
        .map(|(id, &size)| (id, size))
        .collect();
    let profiled: Vec<(usize, usize)> = profiles.iter().map(|p| (p.cluster_id, p.size)).collect();

    if profiled != expected {
        let mismatch = CoreError::ShapeMismatch {
            expected: expected.len(),
            actual: profiled.len(),
        };
        return Err(anyhow::Error::new(mismatch)
            .context("cluster profiles disagree with the fitted cluster sizes"));
    }
    Ok(())
}
