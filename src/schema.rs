//! Column schemas and reconciliation of uploaded tables against them

use crate::error::{CoreError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Coarse column type as seen by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Floating-point feature
    Float,
    /// Integer feature, usually a label-encoded category
    Integer,
    /// Boolean flag
    Boolean,
    /// Unencoded text
    Text,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float32 | DataType::Float64 => Self::Float,
            DataType::Boolean => Self::Boolean,
            DataType::String => Self::Text,
            _ => Self::Integer,
        }
    }
}

/// One named, typed column of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered column contract a model was fit on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Derive a schema from a reference frame, excluding the target column if present.
    pub fn from_frame(frame: &DataFrame, target: Option<&str>) -> Self {
        let columns = frame
            .get_columns()
            .iter()
            .filter(|series| Some(series.name()) != target)
            .map(|series| ColumnSpec {
                name: series.name().to_string(),
                kind: ColumnKind::of(series.dtype()),
            })
            .collect();
        Self { columns }
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Result of aligning an input table to a schema
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Table with exactly the schema's columns, in schema order
    pub frame: DataFrame,
    /// Surplus input columns that were dropped, in input order
    pub dropped: Vec<String>,
}

/// Align `input` to `schema`: reject missing columns, drop extras, reorder,
/// and narrow every floating-point column to single precision.
///
/// The input frame is never modified.
pub fn reconcile(input: &DataFrame, schema: &Schema) -> Result<Reconciled> {
    let input_names = input.get_column_names();

    let missing: Vec<String> = schema
        .columns
        .iter()
        .filter(|spec| !input_names.contains(&spec.name.as_str()))
        .map(|spec| spec.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::Schema { missing });
    }

    let dropped: Vec<String> = input_names
        .iter()
        .filter(|name| !schema.contains(name))
        .map(|name| name.to_string())
        .collect();
    if !dropped.is_empty() {
        warn!(columns = ?dropped, "Dropping columns not used by the model");
    }

    let mut frame = input.select(schema.names())?;

    let float_columns: Vec<String> = frame
        .get_columns()
        .iter()
        .filter(|series| series.dtype() == &DataType::Float64)
        .map(|series| series.name().to_string())
        .collect();
    for name in &float_columns {
        let narrowed = frame.column(name)?.cast(&DataType::Float32)?;
        frame.with_column(narrowed)?;
    }

    debug!(
        rows = frame.height(),
        columns = frame.width(),
        narrowed = float_columns.len(),
        "Reconciled input table"
    );

    Ok(Reconciled { frame, dropped })
}
