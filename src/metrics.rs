//! Held-out evaluation of the turnover classifier

use crate::data::column_values;
use crate::error::{CoreError, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Binary classification metrics with "left" as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ModelMetrics {
    pub fn from_labels(actual: &[u8], predicted: &[u8]) -> Self {
        let n = actual.len().min(predicted.len());
        let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
        let positive = ClassScores::of(actual, predicted, 1);

        Self {
            accuracy: ratio(correct, n),
            precision: positive.precision,
            recall: positive.recall,
            f1_score: positive.f1_score,
        }
    }

    /// One-row table with a column per metric
    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!(
            "accuracy" => [self.accuracy],
            "precision" => [self.precision],
            "recall" => [self.recall],
            "f1_score" => [self.f1_score]
        )?)
    }

    /// Read the first row of a persisted metrics table
    pub fn from_frame(frame: &DataFrame) -> Result<Self> {
        if frame.height() == 0 {
            return Err(CoreError::EmptyInput {
                context: "model metrics",
            });
        }
        let first = |name: &str| -> Result<f64> { Ok(column_values(frame, name)?[0]) };
        Ok(Self {
            accuracy: first("accuracy")?,
            precision: first("precision")?,
            recall: first("recall")?,
            f1_score: first("f1_score")?,
        })
    }
}

/// Precision, recall and F1 of one class treated as positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of actual rows in the class
    pub support: usize,
}

impl ClassScores {
    pub fn of(actual: &[u8], predicted: &[u8], class: u8) -> Self {
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        Self {
            precision,
            recall,
            f1_score: f1(precision, recall),
            support: tp + fn_,
        }
    }
}

/// One line of a classification report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Class label, `macro avg` or `weighted avg`
    pub class: String,
    #[serde(flatten)]
    pub scores: ClassScores,
}

/// Per-class scores on the held-out rows plus macro and support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationReport {
    pub rows: Vec<ReportRow>,
}

pub const MACRO_AVG: &str = "macro avg";
pub const WEIGHTED_AVG: &str = "weighted avg";

impl ClassificationReport {
    /// Scores for every class seen in either label vector, in label order
    pub fn from_labels(actual: &[u8], predicted: &[u8]) -> Self {
        let mut classes: Vec<u8> = actual.iter().chain(predicted).copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let mut rows: Vec<ReportRow> = classes
            .iter()
            .map(|&class| ReportRow {
                class: class.to_string(),
                scores: ClassScores::of(actual, predicted, class),
            })
            .collect();

        if !rows.is_empty() {
            let total: usize = rows.iter().map(|r| r.scores.support).sum();
            let uniform = vec![1.0 / rows.len() as f64; rows.len()];
            let by_support: Vec<f64> = rows
                .iter()
                .map(|r| ratio(r.scores.support, total))
                .collect();

            let macro_avg = averaged(&rows, &uniform, total);
            let weighted_avg = averaged(&rows, &by_support, total);
            rows.push(ReportRow {
                class: MACRO_AVG.to_string(),
                scores: macro_avg,
            });
            rows.push(ReportRow {
                class: WEIGHTED_AVG.to_string(),
                scores: weighted_avg,
            });
        }

        Self { rows }
    }

    pub fn row(&self, class: &str) -> Option<&ClassScores> {
        self.rows.iter().find(|r| r.class == class).map(|r| &r.scores)
    }

    /// Table with columns `class, precision, recall, f1_score, support`
    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!(
            "class" => self.rows.iter().map(|r| r.class.clone()).collect::<Vec<_>>(),
            "precision" => self.rows.iter().map(|r| r.scores.precision).collect::<Vec<_>>(),
            "recall" => self.rows.iter().map(|r| r.scores.recall).collect::<Vec<_>>(),
            "f1_score" => self.rows.iter().map(|r| r.scores.f1_score).collect::<Vec<_>>(),
            "support" => self.rows.iter().map(|r| r.scores.support as i64).collect::<Vec<_>>()
        )?)
    }

    pub fn from_frame(frame: &DataFrame) -> Result<Self> {
        let classes = frame.column("class")?.cast(&DataType::String)?;
        let precision = column_values(frame, "precision")?;
        let recall = column_values(frame, "recall")?;
        let f1_score = column_values(frame, "f1_score")?;
        let support = column_values(frame, "support")?;

        let rows = classes
            .str()?
            .into_iter()
            .enumerate()
            .map(|(i, class)| {
                let class = class.ok_or_else(|| CoreError::InvalidValue {
                    column: "class".to_string(),
                    reason: "missing class label".to_string(),
                })?;
                Ok(ReportRow {
                    class: class.to_string(),
                    scores: ClassScores {
                        precision: precision[i],
                        recall: recall[i],
                        f1_score: f1_score[i],
                        support: as_count("support", support[i])?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }
}

/// A persisted non-negative whole number, rejecting anything a cast would silently mangle
pub fn as_count(column: &str, value: f64) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(CoreError::InvalidValue {
            column: column.to_string(),
            reason: format!("expected a non-negative whole number, got {value}"),
        })
    }
}

fn averaged(rows: &[ReportRow], weights: &[f64], support: usize) -> ClassScores {
    let mean = |pick: fn(&ClassScores) -> f64| {
        rows.iter()
            .zip(weights)
            .map(|(row, w)| w * pick(&row.scores))
            .sum::<f64>()
    };
    ClassScores {
        precision: mean(|s| s.precision),
        recall: mean(|s| s.recall),
        f1_score: mean(|s| s.f1_score),
        support,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Split row indices into (train, test), keeping each label's share in both parts.
///
/// Deterministic for a given seed.
pub fn stratified_split(labels: &[usize], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut classes: Vec<usize> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}
