//! Artifact locations and clustering settings

use std::path::{Path, PathBuf};

/// Name of the binary outcome column in HR records
pub const TARGET_COLUMN: &str = "left";

/// Where each persisted artifact lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Raw, unscaled HR records
    pub original: PathBuf,
    /// Preprocessed records the model and clustering are fit on
    pub preprocessed: PathBuf,
    pub model: PathBuf,
    pub model_metrics: PathBuf,
    /// Per-class held-out scores
    pub classification_report: PathBuf,
    /// Preprocessed features plus a `Cluster` column
    pub cluster_assignments: PathBuf,
    pub cluster_profiles: PathBuf,
}

impl ArtifactPaths {
    /// Standard layout under a project root
    pub fn under(root: &Path) -> Self {
        Self {
            original: root.join("data").join("WA_Fn-UseC_-HR-Employee-Attrition.csv"),
            preprocessed: root.join("data").join("preprocessed_hr_data.csv"),
            model: root.join("models").join("turnover_model.json"),
            model_metrics: root.join("models").join("model_metrics.csv"),
            classification_report: root.join("models").join("classification_report.csv"),
            cluster_assignments: root.join("data").join("clustered_hr_data.csv"),
            cluster_profiles: root.join("data").join("cluster_profiles.csv"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::under(Path::new("."))
    }
}

/// Settings for cluster-count search and K-Means fitting
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub k_min: usize,
    pub k_max: usize,
    /// Fixed seed; repeated runs on the same data pick the same k
    pub seed: u64,
    /// Independent restarts per fit, best inertia kept
    pub n_runs: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k_min: 1,
            k_max: 15,
            seed: 42,
            n_runs: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = ArtifactPaths::under(Path::new("/srv/hr"));
        assert_eq!(
            paths.preprocessed,
            PathBuf::from("/srv/hr/data/preprocessed_hr_data.csv")
        );
        assert_eq!(paths.model, PathBuf::from("/srv/hr/models/turnover_model.json"));
    }
}
