//! Training-time preprocessing of raw HR records

use crate::data::column_values;
use crate::error::{CoreError, Result};
use linfa::prelude::*;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

/// Identifier columns that carry no signal
pub const IDENTIFIER_COLUMNS: [&str; 1] = ["EmployeeNumber"];

/// Summary of what preprocessing changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessReport {
    pub dropped: Vec<String>,
    /// Encoded columns with their categories, index = code
    pub encoded: Vec<(String, Vec<String>)>,
    pub scaled: Vec<String>,
}

/// Drop identifiers and constant columns, label-encode text columns and
/// standard-scale every numeric column except `target`.
pub fn preprocess(raw: &DataFrame, target: &str) -> Result<(DataFrame, PreprocessReport)> {
    if raw.height() == 0 {
        return Err(CoreError::EmptyInput {
            context: "preprocessing",
        });
    }

    let mut report = PreprocessReport::default();
    let mut frame = raw.clone();

    for id in IDENTIFIER_COLUMNS {
        if frame.get_column_names().contains(&id) {
            frame = frame.drop(id)?;
            report.dropped.push(id.to_string());
        }
    }

    let mut constant = Vec::new();
    for series in frame.get_columns() {
        if series.n_unique()? <= 1 {
            constant.push(series.name().to_string());
        }
    }
    for name in &constant {
        frame = frame.drop(name)?;
    }
    report.dropped.extend(constant);

    let text_columns: Vec<String> = frame
        .get_columns()
        .iter()
        .filter(|s| s.dtype() == &DataType::String && s.name() != target)
        .map(|s| s.name().to_string())
        .collect();
    for name in text_columns {
        let (codes, categories) = label_encode(frame.column(&name)?)?;
        frame.with_column(codes)?;
        report.encoded.push((name, categories));
    }

    let numeric_columns: Vec<String> = frame
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric() && s.name() != target)
        .map(|s| s.name().to_string())
        .collect();
    if !numeric_columns.is_empty() {
        let scaled = standard_scale(&frame, &numeric_columns)?;
        for (j, name) in numeric_columns.iter().enumerate() {
            frame.with_column(Series::new(name, scaled.column(j).to_vec()))?;
        }
        report.scaled = numeric_columns;
    }

    info!(
        dropped = report.dropped.len(),
        encoded = report.encoded.len(),
        scaled = report.scaled.len(),
        "Preprocessed records"
    );
    Ok((frame, report))
}

/// Map each distinct value to its rank among the sorted distinct values
fn label_encode(series: &Series) -> Result<(Series, Vec<String>)> {
    let values = series.str()?;
    let categories: Vec<String> = values
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let codes: Vec<Option<i64>> = values
        .into_iter()
        .map(|value| {
            value.and_then(|v| {
                categories
                    .binary_search_by(|c| c.as_str().cmp(v))
                    .ok()
                    .map(|i| i as i64)
            })
        })
        .collect();

    Ok((Series::new(series.name(), codes), categories))
}

/// Zero mean, unit population variance per column
fn standard_scale(frame: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut raw = Array2::<f64>::zeros((frame.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        for (i, value) in column_values(frame, name)?.into_iter().enumerate() {
            raw[[i, j]] = value;
        }
    }

    let dataset = Dataset::new(raw.clone(), Array1::<usize>::zeros(frame.height()));
    let scaler = LinearScaler::standard()
        .fit(&dataset)
        .map_err(|e| CoreError::Scaling(e.to_string()))?;

    Ok(scaler.transform(raw))
}
