//! Cluster-count selection by maximum curvature of the inertia curve

use crate::config::ClusteringConfig;
use crate::error::{CoreError, Result};
use crate::model::fit_kmeans;
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Inertia of the best K-Means fit for one k
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostPoint {
    pub k: usize,
    pub inertia: f64,
}

/// Chosen cluster count together with the curve it was read from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KSelection {
    pub optimal_k: usize,
    pub cost_curve: Vec<CostPoint>,
}

fn validate_range(k_min: usize, k_max: usize) -> Result<()> {
    if k_min == 0 || k_max < 2 || k_min > k_max {
        return Err(CoreError::InvalidRange { k_min, k_max });
    }
    Ok(())
}

/// Pick k from inertias measured at `k_min, k_min + 1, ...`.
///
/// The second difference of the curve is maximised and its index shifted by
/// the two differencing steps (`argmax + 2` when the curve starts at k = 1).
/// The result is clamped to `[max(k_min, 2), k_max]`.
pub fn elbow_k(inertias: &[f64], k_min: usize, k_max: usize) -> Result<usize> {
    validate_range(k_min, k_max)?;
    let lower = k_min.max(2);

    let d1: Vec<f64> = inertias.windows(2).map(|w| w[1] - w[0]).collect();
    let d2: Vec<f64> = d1.windows(2).map(|w| w[1] - w[0]).collect();

    // first maximum wins on ties
    let argmax = d2
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if !(v > bv) => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i);

    let k = match argmax {
        Some(i) => k_min + i + 1,
        None => lower,
    };
    Ok(k.clamp(lower, k_max))
}

/// Fit K-Means for every k in the configured range and choose the elbow.
///
/// `k_max` is capped to the number of rows since no more clusters than
/// observations can be fit.
pub fn select_k(features: &Array2<f64>, config: &ClusteringConfig) -> Result<KSelection> {
    validate_range(config.k_min, config.k_max)?;
    if features.nrows() == 0 {
        return Err(CoreError::EmptyInput {
            context: "cluster count selection",
        });
    }

    let k_max = if features.nrows() < config.k_max {
        warn!(
            requested = config.k_max,
            rows = features.nrows(),
            "Capping k_max to the number of rows"
        );
        features.nrows()
    } else {
        config.k_max
    };
    validate_range(config.k_min, k_max)?;

    let mut cost_curve = Vec::with_capacity(k_max - config.k_min + 1);
    for k in config.k_min..=k_max {
        let model = fit_kmeans(features, k, config)?;
        debug!(k, inertia = model.inertia, "Fitted K-Means");
        cost_curve.push(CostPoint {
            k,
            inertia: model.inertia,
        });
    }

    let inertias: Vec<f64> = cost_curve.iter().map(|p| p.inertia).collect();
    let optimal_k = elbow_k(&inertias, config.k_min, k_max)?;
    info!(optimal_k, "Optimal number of clusters detected");

    Ok(KSelection {
        optimal_k,
        cost_curve,
    })
}
