//! K-Means clustering model implementation

use crate::config::ClusteringConfig;
use crate::error::{CoreError, Result};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Result of one seeded K-Means fit
#[derive(Debug, Clone)]
pub struct KMeansModel {
    pub n_clusters: usize,
    /// Cluster of each training row
    pub labels: Array1<usize>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
}

impl KMeansModel {
    /// Rows per cluster id; clusters left empty by the fit count zero
    pub fn cluster_sizes(&self) -> Vec<usize> {
        self.labels
            .iter()
            .fold(vec![0; self.n_clusters], |mut sizes, &label| {
                sizes[label] += 1;
                sizes
            })
    }
}

/// Fit K-Means with a seeded generator, so identical inputs give identical clusterings
///
/// # Arguments
/// * `features` - Observation matrix (n_samples, n_features)
/// * `n_clusters` - Number of clusters
/// * `config` - Seed, restarts and convergence settings
pub fn fit_kmeans(
    features: &Array2<f64>,
    n_clusters: usize,
    config: &ClusteringConfig,
) -> Result<KMeansModel> {
    if n_clusters == 0 {
        return Err(CoreError::Clustering("number of clusters must be positive".to_string()));
    }

    if features.nrows() < n_clusters {
        return Err(CoreError::Clustering(format!(
            "number of data points ({}) must be at least equal to number of clusters ({})",
            features.nrows(),
            n_clusters
        )));
    }

    let n_samples = features.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples); // Dummy targets for unsupervised learning
    let dataset = Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .n_runs(config.n_runs)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| CoreError::Clustering(e.to_string()))?;

    let labels = model.predict(features);
    let inertia = compute_inertia(features, &labels, model.centroids());

    Ok(KMeansModel {
        n_clusters,
        labels,
        inertia,
    })
}

/// Compute within-cluster sum of squares (inertia)
pub fn compute_inertia(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    centroids: &Array2<f64>,
) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            let distance_sq = point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            inertia += distance_sq;
        }
    }

    inertia
}
