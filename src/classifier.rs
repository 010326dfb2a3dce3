//! Serialized turnover classifier and its training entrypoint

use crate::data::{column_values, feature_matrix};
use crate::error::{CoreError, Result};
use crate::inference::Classifier;
use crate::metrics::{stratified_split, ClassificationReport, ModelMetrics};
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Boundary the logistic model uses to turn probabilities into labels
pub const LOGISTIC_DECISION_THRESHOLD: f64 = 0.5;

/// Logistic regression over a fixed feature schema, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverModel {
    pub schema: Schema,
    pub weights: Vec<f32>,
    pub intercept: f32,
    pub decision_threshold: f64,
    pub trained_at: DateTime<Utc>,
}

impl TurnoverModel {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io(format!("reading model {}", path.display()), e))?;
        let model: Self = serde_json::from_str(&raw)?;
        if model.weights.len() != model.schema.len() {
            return Err(CoreError::ShapeMismatch {
                expected: model.schema.len(),
                actual: model.weights.len(),
            });
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::io(format!("creating {}", parent.display()), e))?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .map_err(|e| CoreError::io(format!("writing model {}", path.display()), e))
    }

    fn scores(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f64>> {
        if features.ncols() != self.weights.len() {
            return Err(CoreError::ShapeMismatch {
                expected: self.weights.len(),
                actual: features.ncols(),
            });
        }
        let weights = Array1::from(self.weights.clone());
        let logits = features.dot(&weights) + self.intercept;
        Ok(logits.mapv(|z| 1.0 / (1.0 + (-f64::from(z)).exp())))
    }
}

impl Classifier for TurnoverModel {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<u8>> {
        let threshold = self.decision_threshold;
        Ok(self
            .scores(features)?
            .mapv(|p| u8::from(p >= threshold)))
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f64>> {
        self.scores(features)
    }
}

/// Fitted model with its held-out evaluation
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TurnoverModel,
    pub metrics: ModelMetrics,
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Fit a turnover model on a preprocessed frame containing `target`.
///
/// Rows are split 80/20 with stratification on the target; the returned
/// metrics are computed on the held-out part.
pub fn train(
    frame: &DataFrame,
    target: &str,
    max_iterations: u64,
    seed: u64,
) -> Result<TrainingOutcome> {
    if frame.height() == 0 {
        return Err(CoreError::EmptyInput {
            context: "model training",
        });
    }

    let schema = Schema::from_frame(frame, Some(target));
    let features = feature_matrix(frame, &schema)?;
    let labels: Vec<usize> = column_values(frame, target)?
        .into_iter()
        .map(|v| usize::from(v >= 0.5))
        .collect();

    let (train_idx, test_idx) = stratified_split(&labels, 0.2, seed);
    let train_x = features.select(Axis(0), &train_idx).mapv(f64::from);
    let train_y = Array1::from(train_idx.iter().map(|&i| labels[i]).collect::<Vec<_>>());
    let dataset = Dataset::new(train_x, train_y);

    let fitted = LogisticRegression::default()
        .max_iterations(max_iterations)
        .fit(&dataset)
        .map_err(|e| CoreError::Training(e.to_string()))?;

    // linfa picks its own positive class; scores must be P(label = 1)
    let sign = if fitted.labels().pos.class == 1 { 1.0 } else { -1.0 };
    let model = TurnoverModel {
        weights: fitted.params().iter().map(|&w| (sign * w) as f32).collect(),
        intercept: (sign * fitted.intercept()) as f32,
        decision_threshold: LOGISTIC_DECISION_THRESHOLD,
        schema,
        trained_at: Utc::now(),
    };

    let test_x: Array2<f32> = features.select(Axis(0), &test_idx);
    let predicted = model.predict(test_x.view())?;
    let actual: Vec<u8> = test_idx.iter().map(|&i| labels[i] as u8).collect();
    let predicted = predicted.to_vec();
    let metrics = ModelMetrics::from_labels(&actual, &predicted);
    let report = ClassificationReport::from_labels(&actual, &predicted);

    info!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        accuracy = metrics.accuracy,
        f1 = metrics.f1_score,
        "Trained turnover model"
    );

    Ok(TrainingOutcome {
        model,
        metrics,
        report,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, ColumnSpec, Schema};
    use ndarray::array;
    use polars::prelude::*;

    fn two_feature_model() -> TurnoverModel {
        TurnoverModel {
            schema: Schema::new(vec![
                ColumnSpec {
                    name: "satisfaction_level".to_string(),
                    kind: ColumnKind::Float,
                },
                ColumnSpec {
                    name: "number_project".to_string(),
                    kind: ColumnKind::Float,
                },
            ]),
            weights: vec![-4.0, 0.5],
            intercept: 0.0,
            decision_threshold: LOGISTIC_DECISION_THRESHOLD,
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_labels_agree_with_probabilities() {
        let model = two_feature_model();
        let x = array![[1.0f32, 0.0], [-1.0, 0.0], [0.0, 0.0]];

        let labels = model.predict(x.view()).unwrap();
        let probabilities = model.predict_proba(x.view()).unwrap();

        assert_eq!(labels.to_vec(), vec![0, 1, 1]);
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[1] > 0.5);
        assert!((probabilities[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_feature_count_checked() {
        let model = two_feature_model();
        let x = array![[1.0f32, 0.0, 3.0]];
        assert!(matches!(
            model.predict(x.view()),
            Err(CoreError::ShapeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("turnover_model.json");
        let model = two_feature_model();

        model.save(&path).unwrap();
        let loaded = TurnoverModel::load(&path).unwrap();

        assert_eq!(loaded, model);
    }

    #[test]
    fn test_train_separable_data() {
        let n = 60;
        let satisfaction: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { -1.0 - (i as f64) / 100.0 } else { 1.0 + (i as f64) / 100.0 })
            .collect();
        let hours: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 / 10.0).collect();
        let left: Vec<i64> = (0..n).map(|i| if i % 2 == 0 { 1 } else { 0 }).collect();
        let frame = df!(
            "satisfaction_level" => satisfaction,
            "average_montly_hours" => hours,
            "left" => left
        )
        .unwrap();

        let outcome = train(&frame, "left", 200, 42).unwrap();

        assert_eq!(
            outcome.model.schema.names(),
            vec!["satisfaction_level", "average_montly_hours"]
        );
        assert_eq!(outcome.train_rows + outcome.test_rows, n);
        assert!(outcome.metrics.accuracy > 0.9);
        assert!(outcome.model.weights[0] < 0.0);
    }

    #[test]
    fn test_train_minority_leavers() {
        // one leaver in four, as in typical HR data
        let n = 80;
        let leaver = |i: usize| i % 4 == 0;
        let satisfaction: Vec<f64> = (0..n)
            .map(|i| if leaver(i) { -1.5 + (i % 3) as f64 * 0.1 } else { 0.5 + (i % 5) as f64 * 0.1 })
            .collect();
        let left: Vec<i64> = (0..n).map(|i| i64::from(leaver(i))).collect();
        let frame = df!("satisfaction_level" => satisfaction, "left" => left).unwrap();

        let outcome = train(&frame, "left", 200, 42).unwrap();

        assert!(outcome.model.weights[0] < 0.0);
        assert!(outcome.metrics.accuracy > 0.9);
        assert!(outcome.metrics.recall > 0.9);
        assert_eq!(outcome.report.row("1").unwrap().support, 4);

        let x = array![[-1.5f32], [0.7]];
        assert_eq!(outcome.model.predict(x.view()).unwrap().to_vec(), vec![1, 0]);
        let probabilities = outcome.model.predict_proba(x.view()).unwrap();
        assert!(probabilities[0] > 0.5 && probabilities[1] < 0.5);
    }
}
