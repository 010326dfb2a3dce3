//! Human-readable cluster descriptions from fixed bucket thresholds
//!
//! Every rule is plain data: a metric, a comparison direction, an ordered
//! list of cut points and a fallback bucket. [`NarrativeRules::default`]
//! carries the stock HR thresholds; callers may supply their own.

use crate::profile::ClusterProfile;
use serde::Serialize;

/// Satisfaction below this is "low"
pub const SATISFACTION_LOW_BELOW: f64 = 0.4;
/// Satisfaction below this (and not low) is "moderate"
pub const SATISFACTION_MODERATE_BELOW: f64 = 0.7;
/// Turnover rate (percent) above this is a high risk
pub const TURNOVER_HIGH_ABOVE: f64 = 25.0;
/// Turnover rate (percent) above this (and not high) is a moderate risk
pub const TURNOVER_MODERATE_ABOVE: f64 = 15.0;
/// Mean project count below this is "few projects"
pub const PROJECTS_FEW_BELOW: f64 = 2.0;
/// Mean project count below this (and not few) is a moderate load
pub const PROJECTS_MODERATE_BELOW: f64 = 4.0;

/// Separator between the phrases of one description
pub const PHRASE_SEPARATOR: &str = " with ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Moderate,
    High,
}

/// Quantity a rule reads from a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metric {
    /// Mean of the named feature
    Mean(String),
    /// Within-cluster turnover percentage
    TurnoverRate,
}

impl Metric {
    fn read(&self, profile: &ClusterProfile) -> Option<f64> {
        match self {
            Self::Mean(feature) => profile.mean_of(feature),
            Self::TurnoverRate => profile.turnover_rate,
        }
    }
}

/// How cut points are compared against the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The first cut with `value < cut` decides
    Below,
    /// The first cut with `value > cut` decides
    Above,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub level: Level,
    pub label: String,
}

impl Bucket {
    pub fn new(level: Level, label: &str) -> Self {
        Self {
            level,
            label: label.to_string(),
        }
    }
}

/// One row of the threshold table
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRule {
    pub metric: Metric,
    pub comparison: Comparison,
    /// Checked in order
    pub cuts: Vec<(f64, Bucket)>,
    /// Used when no cut matches
    pub otherwise: Bucket,
}

impl BucketRule {
    pub fn classify(&self, value: f64) -> &Bucket {
        self.cuts
            .iter()
            .find(|(cut, _)| match self.comparison {
                Comparison::Below => value < *cut,
                Comparison::Above => value > *cut,
            })
            .map(|(_, bucket)| bucket)
            .unwrap_or(&self.otherwise)
    }
}

/// Ordered set of rules applied to every profile
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRules {
    pub rules: Vec<BucketRule>,
}

impl Default for NarrativeRules {
    fn default() -> Self {
        Self {
            rules: vec![
                BucketRule {
                    metric: Metric::Mean("satisfaction_level".to_string()),
                    comparison: Comparison::Below,
                    cuts: vec![
                        (SATISFACTION_LOW_BELOW, Bucket::new(Level::Low, "low satisfaction level")),
                        (
                            SATISFACTION_MODERATE_BELOW,
                            Bucket::new(Level::Moderate, "moderate satisfaction level"),
                        ),
                    ],
                    otherwise: Bucket::new(Level::High, "high satisfaction level"),
                },
                BucketRule {
                    metric: Metric::TurnoverRate,
                    comparison: Comparison::Above,
                    cuts: vec![
                        (TURNOVER_HIGH_ABOVE, Bucket::new(Level::High, "high turnover risk")),
                        (
                            TURNOVER_MODERATE_ABOVE,
                            Bucket::new(Level::Moderate, "moderate turnover risk"),
                        ),
                    ],
                    otherwise: Bucket::new(Level::Low, "low turnover risk"),
                },
                BucketRule {
                    metric: Metric::Mean("number_project".to_string()),
                    comparison: Comparison::Below,
                    cuts: vec![
                        (PROJECTS_FEW_BELOW, Bucket::new(Level::Low, "few projects")),
                        (
                            PROJECTS_MODERATE_BELOW,
                            Bucket::new(Level::Moderate, "moderate project load"),
                        ),
                    ],
                    otherwise: Bucket::new(Level::High, "heavy project load"),
                },
            ],
        }
    }
}

impl NarrativeRules {
    /// Buckets for every rule whose metric the profile carries, in rule order
    pub fn buckets<'a>(&'a self, profile: &ClusterProfile) -> Vec<&'a Bucket> {
        self.rules
            .iter()
            .filter_map(|rule| rule.metric.read(profile).map(|value| rule.classify(value)))
            .collect()
    }

    /// e.g. "low satisfaction level with high turnover risk with heavy project load"
    pub fn describe(&self, profile: &ClusterProfile) -> String {
        self.buckets(profile)
            .iter()
            .map(|bucket| bucket.label.as_str())
            .collect::<Vec<_>>()
            .join(PHRASE_SEPARATOR)
    }
}
