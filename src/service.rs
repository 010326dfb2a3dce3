//! Serving façade: prediction and clustering-insight requests over loaded artifacts

use crate::classifier::TurnoverModel;
use crate::config::{ArtifactPaths, TARGET_COLUMN};
use crate::data::{frame_to_records, load_csv};
use crate::error::{CoreError, Result};
use crate::inference::{predict_onto, Classifier, PredictionBatch};
use crate::metrics::{ClassificationReport, ModelMetrics};
use crate::narrative::{Bucket, NarrativeRules};
use crate::profile::{profiles_from_frame, ClusterProfile};
use crate::schema::{reconcile, Schema};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Rows scored in sample mode
pub const SAMPLE_ROWS: usize = 5;

/// Column counted for the department breakdown of the overview
pub const DEPARTMENT_COLUMN: &str = "Department";

/// What to score
#[derive(Debug, Clone)]
pub enum PredictionRequest {
    /// First rows of the preprocessed reference dataset
    Sample,
    /// A caller-supplied table
    Upload(DataFrame),
}

/// Read-only state shared by every request.
///
/// Built once at startup; absent artifacts are recorded as `None` and turn
/// into errors only for the requests that need them.
pub struct ServingContext {
    model: Option<Box<dyn Classifier>>,
    /// Preprocessed dataset the model was fit on
    reference: Option<DataFrame>,
    /// Raw, unscaled dataset
    original: Option<DataFrame>,
    profiles: Option<Vec<ClusterProfile>>,
    metrics: Option<ModelMetrics>,
    report: Option<ClassificationReport>,
    rules: NarrativeRules,
}

/// Health probe payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub models_loaded: bool,
}

/// Per-column type and null counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    #[serde(rename = "type")]
    pub dtype: String,
    pub non_null_count: usize,
    pub null_count: usize,
}

/// Summary of the raw dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub total_employees: usize,
    pub total_features: usize,
    pub sample_data: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departments: Option<usize>,
    pub columns: Vec<ColumnInfo>,
}

/// Persisted evaluation of the turnover model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub metrics: ModelMetrics,
    /// Absent when no classification report was persisted
    pub classification_report: Option<ClassificationReport>,
}

/// A persisted profile with its narrative
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInsight {
    #[serde(flatten)]
    pub profile: ClusterProfile,
    pub buckets: Vec<Bucket>,
    pub description: String,
}

impl ServingContext {
    pub fn new(
        model: Option<Box<dyn Classifier>>,
        reference: Option<DataFrame>,
        original: Option<DataFrame>,
        profiles: Option<Vec<ClusterProfile>>,
        metrics: Option<ModelMetrics>,
    ) -> Self {
        Self {
            model,
            reference,
            original,
            profiles,
            metrics,
            report: None,
            rules: NarrativeRules::default(),
        }
    }

    pub fn with_report(mut self, report: Option<ClassificationReport>) -> Self {
        self.report = report;
        self
    }

    /// Replace the narrative thresholds
    pub fn with_rules(mut self, rules: NarrativeRules) -> Self {
        self.rules = rules;
        self
    }

    /// Load every artifact that exists; missing or unreadable ones are logged and left empty.
    pub fn load(paths: &ArtifactPaths) -> Self {
        let model = load_optional("turnover model", &paths.model, TurnoverModel::load)
            .map(|m| Box::new(m) as Box<dyn Classifier>);
        let reference = load_optional("preprocessed dataset", &paths.preprocessed, load_csv);
        let original = load_optional("original dataset", &paths.original, load_csv);
        let profiles = load_optional("cluster profiles", &paths.cluster_profiles, |p| {
            profiles_from_frame(&load_csv(p)?)
        });
        let metrics = load_optional("model metrics", &paths.model_metrics, |p| {
            ModelMetrics::from_frame(&load_csv(p)?)
        });
        let report = load_optional("classification report", &paths.classification_report, |p| {
            ClassificationReport::from_frame(&load_csv(p)?)
        });

        info!(
            model = model.is_some(),
            reference = reference.is_some(),
            original = original.is_some(),
            profiles = profiles.is_some(),
            metrics = metrics.is_some(),
            report = report.is_some(),
            "Serving context loaded"
        );
        Self::new(model, reference, original, profiles, metrics).with_report(report)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            models_loaded: self.model.is_some(),
        }
    }

    /// Schema uploads are reconciled against: the reference columns minus the target
    pub fn reference_schema(&self) -> Result<Schema> {
        let reference = self.reference()?;
        Ok(Schema::from_frame(reference, Some(TARGET_COLUMN)))
    }

    /// Score either sample rows or an uploaded table.
    ///
    /// Uploaded rows keep every original column, including ones the model
    /// ignores; the predictions are appended after them.
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionBatch> {
        let model = self.model.as_deref().ok_or(CoreError::ModelUnavailable)?;
        let schema = self.reference_schema()?;
        match request {
            PredictionRequest::Sample => {
                let reference = self.reference()?;
                let features = if reference.get_column_names().contains(&TARGET_COLUMN) {
                    reference.drop(TARGET_COLUMN)?
                } else {
                    reference.clone()
                };
                let sample = features.head(Some(SAMPLE_ROWS));
                let reconciled = reconcile(&sample, &schema)?;
                predict_onto(Some(model), &reconciled.frame, &sample)
            }
            PredictionRequest::Upload(upload) => {
                let reconciled = reconcile(upload, &schema)?;
                if !reconciled.dropped.is_empty() {
                    info!(dropped = ?reconciled.dropped, "Ignoring surplus upload columns");
                }
                predict_onto(Some(model), &reconciled.frame, upload)
            }
        }
    }

    pub fn cluster_profiles(&self) -> Result<&[ClusterProfile]> {
        self.profiles
            .as_deref()
            .ok_or(CoreError::ArtifactUnavailable {
                artifact: "cluster profiles",
            })
    }

    /// Persisted profiles with their narrative descriptions
    pub fn cluster_insights(&self) -> Result<Vec<ClusterInsight>> {
        Ok(self
            .cluster_profiles()?
            .iter()
            .map(|profile| ClusterInsight {
                buckets: self.rules.buckets(profile).into_iter().cloned().collect(),
                description: self.rules.describe(profile),
                profile: profile.clone(),
            })
            .collect())
    }

    /// Metrics row plus the per-class report when one was persisted
    pub fn model_metrics(&self) -> Result<MetricsReport> {
        let metrics = self.metrics.ok_or(CoreError::ArtifactUnavailable {
            artifact: "model metrics",
        })?;
        Ok(MetricsReport {
            metrics,
            classification_report: self.report.clone(),
        })
    }

    pub fn dataset_overview(&self) -> Result<DatasetOverview> {
        let df = self
            .original
            .as_ref()
            .ok_or(CoreError::ArtifactUnavailable {
                artifact: "original dataset",
            })?;
        let names = df.get_column_names();

        let turnover_rate = if names.contains(&TARGET_COLUMN) && df.height() > 0 {
            let left = df
                .column(TARGET_COLUMN)?
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .filter(|v| *v == Some(1.0))
                .count();
            Some(((left as f64 / df.height() as f64) * 100.0 * 100.0).round() / 100.0)
        } else {
            None
        };

        let departments = if names.contains(&DEPARTMENT_COLUMN) {
            let dept = df.column(DEPARTMENT_COLUMN)?;
            let nulls = usize::from(dept.null_count() > 0);
            Some(dept.n_unique()? - nulls)
        } else {
            None
        };

        let columns = df
            .get_columns()
            .iter()
            .map(|s| ColumnInfo {
                column: s.name().to_string(),
                dtype: s.dtype().to_string(),
                non_null_count: s.len() - s.null_count(),
                null_count: s.null_count(),
            })
            .collect();

        Ok(DatasetOverview {
            total_employees: df.height(),
            total_features: df.width(),
            sample_data: frame_to_records(&df.head(Some(SAMPLE_ROWS)))?,
            turnover_rate,
            departments,
            columns,
        })
    }

    fn reference(&self) -> Result<&DataFrame> {
        self.reference.as_ref().ok_or(CoreError::ArtifactUnavailable {
            artifact: "preprocessed dataset",
        })
    }
}

fn load_optional<T>(
    artifact: &str,
    path: &Path,
    load: impl FnOnce(&Path) -> Result<T>,
) -> Option<T> {
    if !path.exists() {
        warn!(artifact, path = %path.display(), "Artifact not found");
        return None;
    }
    match load(path) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(artifact, path = %path.display(), error = %e, "Failed to load artifact");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::FixedClassifier;
    use crate::inference::{PREDICTION_COLUMN, PROBABILITY_COLUMN};
    use crate::profile::FeatureMean;

    fn reference() -> DataFrame {
        df!(
            "satisfaction_level" => [0.38f64, 0.80, 0.11, 0.72, 0.37, 0.41, 0.10],
            "department" => [1i64, 2, 3, 1, 2, 3, 1],
            "left" => [1i64, 0, 1, 0, 1, 0, 1]
        )
        .unwrap()
    }

    fn model() -> Box<dyn Classifier> {
        let schema = Schema::from_frame(&reference(), Some(TARGET_COLUMN));
        Box::new(FixedClassifier::new(
            schema,
            vec![1, 0, 1, 0, 1],
            vec![0.7, 0.2, 0.9, 0.1, 0.6],
        ))
    }

    fn profiles() -> Vec<ClusterProfile> {
        vec![ClusterProfile {
            cluster_id: 0,
            size: 7,
            percentage: 100.0,
            feature_means: vec![FeatureMean {
                feature: "satisfaction_level".to_string(),
                mean: 0.3,
            }],
            turnover_rate: Some(57.1),
        }]
    }

    fn context() -> ServingContext {
        ServingContext::new(
            Some(model()),
            Some(reference()),
            Some(reference()),
            Some(profiles()),
            None,
        )
    }

    #[test]
    fn test_sample_mode_strips_target() {
        let batch = context().predict(&PredictionRequest::Sample).unwrap();

        assert_eq!(batch.rows.height(), SAMPLE_ROWS);
        assert_eq!(
            batch.rows.get_column_names(),
            vec![
                "satisfaction_level",
                "department",
                PREDICTION_COLUMN,
                PROBABILITY_COLUMN
            ]
        );
        assert_eq!(batch.summary.predicted_positive_count, 3);
        assert_eq!(batch.summary.positive_rate_percent, 60.0);
    }

    #[test]
    fn test_upload_keeps_extra_columns_in_results() {
        let upload = df!(
            "employee_id" => ["e1", "e2"],
            "department" => [2i64, 3],
            "satisfaction_level" => [0.2f64, 0.9]
        )
        .unwrap();

        let batch = context()
            .predict(&PredictionRequest::Upload(upload))
            .unwrap();

        assert_eq!(batch.rows.width(), 5);
        assert_eq!(batch.rows.get_column_names()[0], "employee_id");
        assert_eq!(batch.summary.total, 2);
    }

    #[test]
    fn test_upload_missing_columns() {
        let upload = df!("department" => [2i64]).unwrap();
        let err = context()
            .predict(&PredictionRequest::Upload(upload))
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_missing_model_is_server_error() {
        let ctx = ServingContext::new(None, Some(reference()), None, None, None);
        let err = ctx.predict(&PredictionRequest::Sample).unwrap_err();
        assert!(matches!(err, CoreError::ModelUnavailable));
        assert!(!ctx.health().models_loaded);
    }

    #[test]
    fn test_cluster_insights() {
        let insights = context().cluster_insights().unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(
            insights[0].description,
            "low satisfaction level with high turnover risk"
        );

        let json = serde_json::to_value(&insights[0]).unwrap();
        assert_eq!(json["cluster_id"], 0);
        assert_eq!(json["buckets"][0]["level"], "low");
    }

    #[test]
    fn test_custom_rules() {
        let mut rules = NarrativeRules::default();
        rules.rules.retain(|rule| rule.metric == crate::narrative::Metric::TurnoverRate);
        let insights = context().with_rules(rules).cluster_insights().unwrap();
        assert_eq!(insights[0].description, "high turnover risk");
    }

    #[test]
    fn test_missing_profiles() {
        let ctx = ServingContext::new(None, None, None, None, None);
        assert!(matches!(
            ctx.cluster_profiles(),
            Err(CoreError::ArtifactUnavailable { .. })
        ));
        assert!(ctx.model_metrics().is_err());
    }

    #[test]
    fn test_model_metrics_with_and_without_report() {
        let metrics = ModelMetrics {
            accuracy: 0.8,
            precision: 0.75,
            recall: 0.6,
            f1_score: 0.67,
        };
        let ctx = ServingContext::new(None, None, None, None, Some(metrics));
        let bare = ctx.model_metrics().unwrap();
        assert_eq!(bare.metrics, metrics);
        assert!(bare.classification_report.is_none());
        assert!(serde_json::to_value(&bare).unwrap()["classification_report"].is_null());

        let report = ClassificationReport::from_labels(&[0, 1, 1], &[0, 1, 0]);
        let ctx = ctx.with_report(Some(report));
        let full = serde_json::to_value(ctx.model_metrics().unwrap()).unwrap();
        assert_eq!(full["metrics"]["accuracy"], 0.8);
        assert_eq!(full["classification_report"][1]["class"], "1");
        assert_eq!(full["classification_report"][1]["support"], 2);
    }

    #[test]
    fn test_dataset_overview() {
        let overview = context().dataset_overview().unwrap();

        assert_eq!(overview.total_employees, 7);
        assert_eq!(overview.total_features, 3);
        assert_eq!(overview.sample_data.len(), SAMPLE_ROWS);
        assert_eq!(overview.turnover_rate, Some(57.14));
        assert_eq!(overview.departments, None);
        assert_eq!(overview.columns[0].column, "satisfaction_level");
        assert_eq!(overview.columns[0].null_count, 0);
    }

    #[test]
    fn test_load_tolerates_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ServingContext::load(&ArtifactPaths::under(dir.path()));

        assert!(!ctx.health().models_loaded);
        assert!(ctx.dataset_overview().is_err());
    }
}
