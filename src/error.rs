//! Error taxonomy for the inference and clustering core

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type used by the library modules
pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures surfaced by the core components.
///
/// Client errors are problems with the caller's input and can be fixed by
/// resubmitting different data. Everything else is a server-side
/// misconfiguration or a programming error.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Required model features are absent from the input table
    #[error("missing columns in uploaded data: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// No classifier was loaded at startup
    #[error("turnover model is not loaded")]
    ModelUnavailable,

    /// Invalid cluster-count search range
    #[error("invalid cluster range [{k_min}, {k_max}]: need 1 <= k_min <= k_max and k_max >= 2")]
    InvalidRange { k_min: usize, k_max: usize },

    /// A zero-row table reached an operation that needs at least one row
    #[error("{context} requires at least one row")]
    EmptyInput { context: &'static str },

    /// A dataset or clustering artifact was not loaded at startup
    #[error("{artifact} not loaded")]
    ArtifactUnavailable { artifact: &'static str },

    /// Row or feature counts disagree between two aligned inputs
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A feature column holds a value the model cannot consume
    #[error("invalid value in column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("model training failed: {0}")]
    Training(String),

    #[error("feature scaling failed: {0}")]
    Scaling(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the caller can fix this by changing its input (4xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::EmptyInput { .. }
                | Self::InvalidValue { .. }
                | Self::ShapeMismatch { .. }
        )
    }
}
