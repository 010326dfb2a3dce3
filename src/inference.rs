//! Batch inference over reconciled tables and aggregate turnover statistics

use crate::data::{feature_matrix, frame_to_records};
use crate::error::{CoreError, Result};
use crate::schema::Schema;
use ndarray::{Array1, ArrayView2};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Name of the appended predicted-label column
pub const PREDICTION_COLUMN: &str = "Predicted_Turnover";
/// Name of the appended positive-class probability column
pub const PROBABILITY_COLUMN: &str = "Turnover_Probability";

/// A trained binary classifier (0 = stayed, 1 = left).
///
/// Labels and probabilities are both produced by the classifier itself; the
/// decision boundary between them is the classifier's own.
pub trait Classifier: Send + Sync {
    /// Schema the classifier was fit on
    fn schema(&self) -> &Schema;

    /// Predicted labels, one per row
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<u8>>;

    /// Probability of the positive class, one per row
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f64>>;
}

/// Aggregate statistics over one prediction batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub total: usize,
    pub predicted_positive_count: usize,
    /// Percentage of rows predicted positive, rounded to 2 decimals
    pub positive_rate_percent: f64,
}

impl PredictionSummary {
    pub fn from_labels(labels: &[u8]) -> Self {
        let total = labels.len();
        let predicted_positive_count = labels.iter().filter(|&&label| label == 1).count();
        let positive_rate_percent = if total > 0 {
            round2(predicted_positive_count as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        Self {
            total,
            predicted_positive_count,
            positive_rate_percent,
        }
    }
}

/// Input rows with predicted label and probability appended, plus a summary
#[derive(Debug, Clone)]
pub struct PredictionBatch {
    pub rows: DataFrame,
    pub summary: PredictionSummary,
}

impl PredictionBatch {
    pub fn labels(&self) -> Result<Vec<i32>> {
        Ok(self
            .rows
            .column(PREDICTION_COLUMN)?
            .i32()?
            .into_no_null_iter()
            .collect())
    }

    pub fn probabilities(&self) -> Result<Vec<f64>> {
        Ok(self
            .rows
            .column(PROBABILITY_COLUMN)?
            .f64()?
            .into_no_null_iter()
            .collect())
    }

    /// JSON payload `{ predictions: [...], summary: {...} }`
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::json!({
            "predictions": frame_to_records(&self.rows)?,
            "summary": self.summary,
        }))
    }
}

/// Score a reconciled table, appending results to the same table.
pub fn predict(model: Option<&dyn Classifier>, data: &DataFrame) -> Result<PredictionBatch> {
    predict_onto(model, data, data)
}

/// Score `data` (already reconciled to the model schema) and attach the
/// results to `original`, which must have the same rows in the same order.
///
/// The classifier is invoked once for labels and once for probabilities over
/// the whole batch.
pub fn predict_onto(
    model: Option<&dyn Classifier>,
    data: &DataFrame,
    original: &DataFrame,
) -> Result<PredictionBatch> {
    let model = model.ok_or(CoreError::ModelUnavailable)?;

    if original.height() != data.height() {
        return Err(CoreError::ShapeMismatch {
            expected: data.height(),
            actual: original.height(),
        });
    }

    let (labels, probabilities) = if data.height() == 0 {
        (Vec::new(), Vec::new())
    } else {
        let features = feature_matrix(data, model.schema())?;
        let labels = model.predict(features.view())?;
        let probabilities = model.predict_proba(features.view())?;
        for produced in [labels.len(), probabilities.len()] {
            if produced != data.height() {
                return Err(CoreError::ShapeMismatch {
                    expected: data.height(),
                    actual: produced,
                });
            }
        }
        (labels.to_vec(), probabilities.to_vec())
    };

    let summary = PredictionSummary::from_labels(&labels);

    let mut rows = original.clone();
    let label_values: Vec<i32> = labels.iter().map(|&label| i32::from(label)).collect();
    rows.with_column(Series::new(PREDICTION_COLUMN, label_values))?;
    rows.with_column(Series::new(PROBABILITY_COLUMN, probabilities))?;

    info!(
        total = summary.total,
        predicted_to_leave = summary.predicted_positive_count,
        rate = summary.positive_rate_percent,
        "Scored prediction batch"
    );

    Ok(PredictionBatch { rows, summary })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
