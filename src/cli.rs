//! Command-line interface definitions and argument parsing

use crate::config::{ArtifactPaths, ClusteringConfig};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Employee turnover prediction and behavioral clustering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Artifact locations; each defaults to the standard layout under `--root`
#[derive(ClapArgs, Debug, Clone)]
pub struct ArtifactArgs {
    /// Project root holding the data/ and models/ directories
    #[arg(long, env = "CHURNFORGE_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Raw HR records
    #[arg(long, env = "CHURNFORGE_ORIGINAL", global = true)]
    pub original: Option<PathBuf>,

    /// Preprocessed HR records
    #[arg(long, env = "CHURNFORGE_PREPROCESSED", global = true)]
    pub preprocessed: Option<PathBuf>,

    /// Serialized turnover model
    #[arg(long, env = "CHURNFORGE_MODEL", global = true)]
    pub model: Option<PathBuf>,

    /// Held-out model metrics table
    #[arg(long, env = "CHURNFORGE_METRICS", global = true)]
    pub metrics: Option<PathBuf>,

    /// Per-class classification report table
    #[arg(long, env = "CHURNFORGE_REPORT", global = true)]
    pub report: Option<PathBuf>,

    /// Clustered records with their cluster ids
    #[arg(long, env = "CHURNFORGE_ASSIGNMENTS", global = true)]
    pub assignments: Option<PathBuf>,

    /// Cluster profiles table
    #[arg(long, env = "CHURNFORGE_PROFILES", global = true)]
    pub profiles: Option<PathBuf>,
}

impl ArtifactArgs {
    pub fn paths(&self) -> ArtifactPaths {
        let mut paths = ArtifactPaths::under(&self.root);
        if let Some(ref p) = self.original {
            paths.original = p.clone();
        }
        if let Some(ref p) = self.preprocessed {
            paths.preprocessed = p.clone();
        }
        if let Some(ref p) = self.model {
            paths.model = p.clone();
        }
        if let Some(ref p) = self.metrics {
            paths.model_metrics = p.clone();
        }
        if let Some(ref p) = self.report {
            paths.classification_report = p.clone();
        }
        if let Some(ref p) = self.assignments {
            paths.cluster_assignments = p.clone();
        }
        if let Some(ref p) = self.profiles {
            paths.cluster_profiles = p.clone();
        }
        paths
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode and scale the raw dataset
    Preprocess,

    /// Fit the turnover model on the preprocessed dataset
    Train {
        /// Maximum optimizer iterations
        #[arg(long, default_value = "100")]
        max_iters: u64,

        /// Seed for the train/test split
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Choose k, cluster the preprocessed dataset and profile the clusters
    Cluster {
        /// Largest cluster count to try
        #[arg(long, default_value = "15")]
        max_k: usize,

        /// Seed for K-Means initialisation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Maximum iterations for K-Means algorithm
        #[arg(long, default_value = "300")]
        max_iters: u64,

        /// Tolerance for K-Means convergence
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,
    },

    /// Predict turnover for an uploaded CSV or for sample rows
    Predict {
        /// CSV file to score
        #[arg(short, long, conflicts_with = "sample", required_unless_present = "sample")]
        input: Option<PathBuf>,

        /// Score the first rows of the preprocessed dataset instead
        #[arg(long)]
        sample: bool,
    },

    /// Print cluster profiles with their descriptions
    Profiles,

    /// Print an overview of the raw dataset
    Overview,

    /// Print persisted model metrics
    Metrics,

    /// Report whether the model is loaded
    Health,
}

impl Command {
    /// Clustering settings for the `cluster` subcommand
    pub fn clustering_config(&self) -> Option<ClusteringConfig> {
        match *self {
            Command::Cluster {
                max_k,
                seed,
                max_iters,
                tolerance,
            } => Some(ClusteringConfig {
                k_max: max_k,
                seed,
                max_iterations: max_iters,
                tolerance,
                ..ClusteringConfig::default()
            }),
            _ => None,
        }
    }
}

/// Only `.csv` uploads are accepted
pub fn validate_upload(path: &Path) -> crate::Result<()> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        anyhow::bail!(
            "Invalid file format for {}. Please upload a CSV file",
            path.display()
        );
    }
    Ok(())
}
