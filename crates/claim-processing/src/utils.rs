//! Shared helpers for moving data between polars frames and plain vectors.

use crate::constants::{FEATURE_COLUMNS, TARGET_COLUMN};
use crate::error::TransformationError;
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Column extraction
// =============================================================================

/// Read a numeric column as `f64`, keeping nulls.
pub fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, TransformationError> {
    let col = df
        .column(column)
        .map_err(|_| TransformationError::MissingColumn(column.to_string()))?;
    // An all-null column is inferred as String by the CSV reader.
    let all_null = col.null_count() == col.len();
    if !is_numeric_dtype(col.dtype()) && !all_null {
        return Err(TransformationError::WrongDtype {
            column: column.to_string(),
            dtype: col.dtype().to_string(),
            expected: "numeric",
        });
    }
    let series = col.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Read a text column, keeping nulls.
pub fn string_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>, TransformationError> {
    let col = df
        .column(column)
        .map_err(|_| TransformationError::MissingColumn(column.to_string()))?;
    let series = col.as_materialized_series();
    if !is_string_dtype(series.dtype()) {
        return Err(TransformationError::WrongDtype {
            column: column.to_string(),
            dtype: series.dtype().to_string(),
            expected: "string",
        });
    }
    let series = series.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

// =============================================================================
// Feature frames
// =============================================================================

/// Build a frame of feature rows plus the label column.
///
/// `rows` must be in [`FEATURE_COLUMNS`] order.
pub fn feature_frame(rows: &[Vec<f64>], labels: &[u8]) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Column> = FEATURE_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values: Vec<f64> = rows.iter().map(|row| row[index]).collect();
            Column::new((*name).into(), values)
        })
        .collect();
    let labels: Vec<i64> = labels.iter().map(|&label| i64::from(label)).collect();
    columns.push(Column::new(TARGET_COLUMN.into(), labels));
    DataFrame::new(columns)
}

/// Read a transformed frame back into feature rows and labels.
///
/// Every feature and label must be present; transformed frames never
/// contain nulls.
pub fn read_feature_frame(df: &DataFrame) -> Result<(Vec<Vec<f64>>, Vec<u8>), TransformationError> {
    let height = df.height();
    let mut rows = vec![Vec::with_capacity(FEATURE_COLUMNS.len()); height];

    for name in FEATURE_COLUMNS {
        let values = numeric_values(df, name)?;
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value.ok_or_else(|| TransformationError::NoObservedValues(name.to_string()))?);
        }
    }

    let labels = numeric_values(df, TARGET_COLUMN)?
        .into_iter()
        .map(|label| match label {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v as u8),
            other => Err(TransformationError::UnknownCategory {
                column: TARGET_COLUMN.to_string(),
                value: format!("{other:?}"),
            }),
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok((rows, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_values_casts_integers() {
        let df = df!["Age" => [Some(20i64), None, Some(40)]].unwrap();
        assert_eq!(
            numeric_values(&df, "Age").unwrap(),
            vec![Some(20.0), None, Some(40.0)]
        );
    }

    #[test]
    fn test_numeric_values_rejects_text() {
        let df = df!["Age" => ["twenty", "thirty"]].unwrap();
        let err = numeric_values(&df, "Age").unwrap_err();
        assert_eq!(err.error_code(), "WRONG_DTYPE");
    }

    #[test]
    fn test_missing_column() {
        let df = df!["Age" => [1i64]].unwrap();
        assert!(matches!(
            string_values(&df, "Gender"),
            Err(TransformationError::MissingColumn(c)) if c == "Gender"
        ));
    }

    #[test]
    fn test_feature_frame_roundtrip() {
        let rows = vec![vec![0.5; FEATURE_COLUMNS.len()], vec![1.5; FEATURE_COLUMNS.len()]];
        let labels = vec![0u8, 1];
        let df = feature_frame(&rows, &labels).unwrap();
        assert_eq!(df.width(), FEATURE_COLUMNS.len() + 1);

        let (read_rows, read_labels) = read_feature_frame(&df).unwrap();
        assert_eq!(read_rows, rows);
        assert_eq!(read_labels, labels);
    }
}
