//! Per-cluster descriptive statistics over unscaled records

use crate::config::TARGET_COLUMN;
use crate::data::column_values;
use crate::metrics::as_count;
use crate::error::{CoreError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Interpretable features summarised for every cluster, in output order
pub const KEY_FEATURES: [&str; 7] = [
    "satisfaction_level",
    "last_evaluation",
    "number_project",
    "average_montly_hours",
    "time_spend_company",
    "Work_accident",
    "promotion_last_5years",
];

const CLUSTER_COLUMN: &str = "Cluster";
const SIZE_COLUMN: &str = "Size";
const PERCENTAGE_COLUMN: &str = "Percentage";
const TURNOVER_RATE_COLUMN: &str = "Turnover_Rate";
const MEAN_PREFIX: &str = "Mean_";

/// Mean of one feature within a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMean {
    pub feature: String,
    pub mean: f64,
}

/// Descriptive statistics for one non-empty cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster_id: usize,
    pub size: usize,
    /// Share of all profiled rows, in percent
    pub percentage: f64,
    pub feature_means: Vec<FeatureMean>,
    /// Percentage of the cluster with a positive outcome, when the outcome is known
    pub turnover_rate: Option<f64>,
}

impl ClusterProfile {
    pub fn mean_of(&self, feature: &str) -> Option<f64> {
        self.feature_means
            .iter()
            .find(|m| m.feature == feature)
            .map(|m| m.mean)
    }
}

/// Profile each cluster present in `assignments` using rows of `reference`.
///
/// `assignments[i]` is the cluster of row `i`. Key features missing from the
/// reference table are skipped. Profiles are ordered by cluster id.
pub fn profile(assignments: &[usize], reference: &DataFrame) -> Result<Vec<ClusterProfile>> {
    if assignments.len() != reference.height() {
        return Err(CoreError::ShapeMismatch {
            expected: reference.height(),
            actual: assignments.len(),
        });
    }

    let names = reference.get_column_names();
    let features: Vec<&str> = KEY_FEATURES
        .iter()
        .copied()
        .filter(|f| names.contains(f))
        .collect();
    let skipped: Vec<&str> = KEY_FEATURES
        .iter()
        .copied()
        .filter(|f| !names.contains(f))
        .collect();
    if !skipped.is_empty() {
        warn!(features = ?skipped, "Key features absent from reference table, skipping");
    }

    let feature_values = features
        .iter()
        .map(|f| column_values(reference, f))
        .collect::<Result<Vec<_>>>()?;
    let outcome = if names.contains(&TARGET_COLUMN) {
        Some(column_values(reference, TARGET_COLUMN)?)
    } else {
        None
    };

    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &cluster) in assignments.iter().enumerate() {
        members.entry(cluster).or_default().push(row);
    }

    let total = assignments.len() as f64;
    let profiles: Vec<ClusterProfile> = members
        .into_iter()
        .map(|(cluster_id, rows)| {
            let size = rows.len();
            let mean = |values: &[f64]| rows.iter().map(|&r| values[r]).sum::<f64>() / size as f64;

            let feature_means = features
                .iter()
                .zip(&feature_values)
                .map(|(feature, values)| FeatureMean {
                    feature: feature.to_string(),
                    mean: mean(values.as_slice()),
                })
                .collect();

            let turnover_rate = outcome.as_ref().map(|values| {
                let left = rows.iter().filter(|&&r| values[r] == 1.0).count();
                left as f64 / size as f64 * 100.0
            });

            ClusterProfile {
                cluster_id,
                size,
                percentage: size as f64 / total * 100.0,
                feature_means,
                turnover_rate,
            }
        })
        .collect();

    info!(clusters = profiles.len(), rows = assignments.len(), "Profiled clusters");
    Ok(profiles)
}

/// Tabular form: `Cluster, Size, Percentage, Mean_<feature>..., Turnover_Rate`
pub fn profiles_to_frame(profiles: &[ClusterProfile]) -> Result<DataFrame> {
    let mut columns = vec![
        Series::new(
            CLUSTER_COLUMN,
            profiles.iter().map(|p| p.cluster_id as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            SIZE_COLUMN,
            profiles.iter().map(|p| p.size as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            PERCENTAGE_COLUMN,
            profiles.iter().map(|p| p.percentage).collect::<Vec<_>>(),
        ),
    ];

    let features: Vec<String> = profiles
        .first()
        .map(|p| p.feature_means.iter().map(|m| m.feature.clone()).collect())
        .unwrap_or_default();
    for feature in &features {
        let means: Vec<Option<f64>> = profiles.iter().map(|p| p.mean_of(feature)).collect();
        columns.push(Series::new(&format!("{MEAN_PREFIX}{feature}"), means));
    }

    if profiles.iter().any(|p| p.turnover_rate.is_some()) {
        let rates: Vec<Option<f64>> = profiles.iter().map(|p| p.turnover_rate).collect();
        columns.push(Series::new(TURNOVER_RATE_COLUMN, rates));
    }

    Ok(DataFrame::new(columns)?)
}

/// Parse profiles persisted by [`profiles_to_frame`]
pub fn profiles_from_frame(frame: &DataFrame) -> Result<Vec<ClusterProfile>> {
    let ids = column_values(frame, CLUSTER_COLUMN)?;
    let sizes = column_values(frame, SIZE_COLUMN)?;
    let percentages = column_values(frame, PERCENTAGE_COLUMN)?;

    let mut means = Vec::new();
    for name in frame.get_column_names() {
        if let Some(feature) = name.strip_prefix(MEAN_PREFIX) {
            means.push((feature.to_string(), column_values(frame, name)?));
        }
    }

    let rates = if frame.get_column_names().contains(&TURNOVER_RATE_COLUMN) {
        Some(column_values(frame, TURNOVER_RATE_COLUMN)?)
    } else {
        None
    };

    (0..frame.height())
        .map(|i| {
            Ok(ClusterProfile {
                cluster_id: as_count(CLUSTER_COLUMN, ids[i])?,
                size: as_count(SIZE_COLUMN, sizes[i])?,
                percentage: percentages[i],
                feature_means: means
                    .iter()
                    .map(|(feature, values)| FeatureMean {
                        feature: feature.clone(),
                        mean: values[i],
                    })
                    .collect(),
                turnover_rate: rates.as_ref().map(|r| r[i]),
            })
        })
        .collect()
}
