//! Tabular I/O using Polars: CSV loading and writing, feature matrices, JSON records

use crate::error::{CoreError, Result};
use crate::schema::Schema;
use ndarray::Array2;
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Load a CSV file with a header row into a DataFrame
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        "Loaded CSV"
    );
    Ok(frame)
}

/// Parse CSV bytes received from an upload
pub fn read_csv_bytes(bytes: Vec<u8>) -> Result<DataFrame> {
    let frame = CsvReader::new(Cursor::new(bytes)).finish()?;
    Ok(frame)
}

/// Write a DataFrame to CSV, creating parent directories as needed
pub fn write_csv(frame: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::io(format!("creating {}", parent.display()), e))?;
    }
    let mut file =
        File::create(path).map_err(|e| CoreError::io(format!("creating {}", path.display()), e))?;

    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;

    debug!(path = %path.display(), rows = frame.height(), "Wrote CSV");
    Ok(())
}

/// Extract one column as f64 values, rejecting nulls
pub fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = frame.column(name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .map(|value| {
            value.ok_or_else(|| CoreError::InvalidValue {
                column: name.to_string(),
                reason: "missing or non-numeric value".to_string(),
            })
        })
        .collect()
}

/// Build an `(n_rows, n_columns)` single-precision matrix following schema order
pub fn feature_matrix(frame: &DataFrame, schema: &Schema) -> Result<Array2<f32>> {
    let n_rows = frame.height();
    let n_cols = schema.len();
    let mut matrix = Array2::<f32>::zeros((n_rows, n_cols));

    for (j, spec) in schema.columns.iter().enumerate() {
        let values = column_values(frame, &spec.name)?;
        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value as f32;
        }
    }

    Ok(matrix)
}

/// Build an f64 matrix from every column of the frame, in frame order
pub fn numeric_matrix(frame: &DataFrame) -> Result<Array2<f64>> {
    let names: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut matrix = Array2::<f64>::zeros((frame.height(), names.len()));

    for (j, name) in names.iter().enumerate() {
        for (i, value) in column_values(frame, name)?.into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }

    Ok(matrix)
}

/// Convert each row into a JSON object keyed by column name
pub fn frame_to_records(frame: &DataFrame) -> Result<Vec<Value>> {
    let mut records = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let mut record = Map::new();
        for series in frame.get_columns() {
            record.insert(series.name().to_string(), any_value_to_json(series.get(i)?));
        }
        records.push(Value::Object(record));
    }
    Ok(records)
}

fn any_value_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_to_json(f64::from(v)),
        AnyValue::Float64(v) => float_to_json(v),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, ColumnSpec};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "satisfaction_level,number_project,left").unwrap();
        writeln!(file, "0.38,2,1").unwrap();
        writeln!(file, "0.80,5,0").unwrap();
        writeln!(file, "0.11,7,1").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let frame = load_csv(file.path()).unwrap();

        assert_eq!(frame.height(), 3);
        assert_eq!(
            frame.get_column_names(),
            vec!["satisfaction_level", "number_project", "left"]
        );
    }

    #[test]
    fn test_read_csv_bytes() {
        let frame = read_csv_bytes(b"a,b\n1,2.5\n3,4.5\n".to_vec()).unwrap();
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(column_values(&frame, "b").unwrap(), vec![2.5, 4.5]);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let frame = df!("x" => [1.0f64, 2.0], "y" => [3i64, 4]).unwrap();

        write_csv(&frame, &path).unwrap();
        let loaded = load_csv(&path).unwrap();

        assert_eq!(loaded.shape(), (2, 2));
        assert_eq!(column_values(&loaded, "y").unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_feature_matrix_follows_schema_order() {
        let frame = df!("b" => [1i64, 2], "a" => [0.5f32, 0.25]).unwrap();
        let schema = Schema::new(vec![
            ColumnSpec {
                name: "a".to_string(),
                kind: ColumnKind::Float,
            },
            ColumnSpec {
                name: "b".to_string(),
                kind: ColumnKind::Integer,
            },
        ]);

        let matrix = feature_matrix(&frame, &schema).unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[0, 0]], 0.5);
        assert_eq!(matrix[[1, 1]], 2.0);
    }

    #[test]
    fn test_null_values_rejected() {
        let frame = df!("a" => [Some(1.0f64), None]).unwrap();
        let err = column_values(&frame, "a").unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn test_frame_to_records() {
        let frame = df!("name" => ["ana", "li"], "score" => [0.5f64, 1.0]).unwrap();
        let records = frame_to_records(&frame).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "ana");
        assert_eq!(records[1]["score"], 1.0);
    }
}
