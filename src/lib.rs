//! ChurnForge: employee turnover prediction and behavioral clustering
//!
//! The core reconciles uploaded tables against a model's feature schema,
//! scores them with a trained classifier, picks a cluster count by the elbow
//! of the K-Means inertia curve and describes each cluster in plain words.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod preprocess;
pub mod profile;
pub mod schema;
pub mod selection;
pub mod service;

// Re-export public items for easier access
pub use classifier::TurnoverModel;
pub use config::{ArtifactPaths, ClusteringConfig, TARGET_COLUMN};
pub use data::{load_csv, read_csv_bytes, write_csv};
pub use error::CoreError;
pub use inference::{predict, Classifier, PredictionBatch, PredictionSummary};
pub use metrics::{ClassificationReport, ModelMetrics};
pub use model::{fit_kmeans, KMeansModel};
pub use narrative::NarrativeRules;
pub use profile::{profile, ClusterProfile};
pub use schema::{reconcile, Schema};
pub use selection::{elbow_k, select_k, KSelection};
pub use service::{PredictionRequest, ServingContext};

/// Result type used by the pipeline and CLI layers
pub type Result<T> = anyhow::Result<T>;
