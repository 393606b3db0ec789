//! Encoding of raw claim rows into the eleven-feature numeric layout.
//!
//! `id` is dropped, `Gender` becomes 0/1, `Vehicle_Age` becomes two indicator
//! columns and `Vehicle_Damage` becomes a single indicator. Missing values
//! stay missing here; the fitted transformer imputes them.

use crate::constants::*;
use crate::error::TransformationError;
use crate::types::{Gender, VehicleAge, parse_damage};
use crate::utils::{numeric_values, string_values};
use polars::prelude::*;
use tracing::debug;

/// One encoded row; `None` marks a missing value.
pub type EncodedRow = [Option<f64>; FEATURE_COUNT];

/// Encoded rows with their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedData {
    pub rows: Vec<EncodedRow>,
    pub labels: Vec<u8>,
    /// Rows removed because the label was missing.
    pub dropped_rows: usize,
}

impl EncodedData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn unknown(column: &str, value: &str) -> TransformationError {
    TransformationError::UnknownCategory {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Encode a raw frame. Rows whose label is missing are dropped.
pub fn encode_frame(df: &DataFrame) -> Result<EncodedData, TransformationError> {
    let gender = string_values(df, GENDER)?;
    let age = numeric_values(df, AGE)?;
    let driving_license = numeric_values(df, DRIVING_LICENSE)?;
    let region_code = numeric_values(df, REGION_CODE)?;
    let previously_insured = numeric_values(df, PREVIOUSLY_INSURED)?;
    let vehicle_age = string_values(df, VEHICLE_AGE)?;
    let vehicle_damage = string_values(df, VEHICLE_DAMAGE)?;
    let annual_premium = numeric_values(df, ANNUAL_PREMIUM)?;
    let policy_sales_channel = numeric_values(df, POLICY_SALES_CHANNEL)?;
    let vintage = numeric_values(df, VINTAGE)?;
    let response = numeric_values(df, TARGET_COLUMN)?;

    let mut rows = Vec::with_capacity(df.height());
    let mut labels = Vec::with_capacity(df.height());
    let mut dropped_rows = 0usize;

    for i in 0..df.height() {
        let label = match response[i] {
            None => {
                dropped_rows += 1;
                continue;
            }
            Some(v) if v == 0.0 || v == 1.0 => v as u8,
            Some(v) => return Err(unknown(TARGET_COLUMN, &v.to_string())),
        };

        let gender_code = match gender[i].as_deref() {
            None => None,
            Some(raw) => Some(f64::from(
                Gender::from_raw(raw).ok_or_else(|| unknown(GENDER, raw))?.code(),
            )),
        };

        let (lt_1, gt_2) = match vehicle_age[i].as_deref() {
            None => (None, None),
            Some(raw) => {
                let (lt, gt) = VehicleAge::from_raw(raw)
                    .ok_or_else(|| unknown(VEHICLE_AGE, raw))?
                    .indicators();
                (Some(f64::from(lt)), Some(f64::from(gt)))
            }
        };

        let damage = match vehicle_damage[i].as_deref() {
            None => None,
            Some(raw) => Some(if parse_damage(raw).ok_or_else(|| unknown(VEHICLE_DAMAGE, raw))? {
                1.0
            } else {
                0.0
            }),
        };

        rows.push([
            gender_code,
            age[i],
            driving_license[i],
            region_code[i],
            previously_insured[i],
            annual_premium[i],
            policy_sales_channel[i],
            vintage[i],
            lt_1,
            gt_2,
            damage,
        ]);
        labels.push(label);
    }

    debug!(
        "Encoded {} rows ({} dropped for missing label)",
        rows.len(),
        dropped_rows
    );

    Ok(EncodedData {
        rows,
        labels,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_frame() -> DataFrame {
        df![
            "id" => [1i64, 2, 3],
            "Gender" => [Some("Male"), Some("Female"), None],
            "Age" => [Some(44i64), Some(23), None],
            "Driving_License" => [1i64, 1, 0],
            "Region_Code" => [28.0, 3.0, 11.0],
            "Previously_Insured" => [0i64, 1, 0],
            "Vehicle_Age" => ["> 2 Years", "< 1 Year", "1-2 Year"],
            "Vehicle_Damage" => ["Yes", "No", "Yes"],
            "Annual_Premium" => [40454.0, 2630.0, 33536.0],
            "Policy_Sales_Channel" => [26.0, 152.0, 124.0],
            "Vintage" => [217i64, 183, 27],
            "Response" => [Some(1i64), Some(0), Some(1)],
        ]
        .unwrap()
    }

    #[test]
    fn test_encode_maps_categories() {
        let encoded = encode_frame(&raw_frame()).unwrap();
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded.labels, vec![1, 0, 1]);

        let first = encoded.rows[0];
        assert_eq!(first[0], Some(1.0));
        assert_eq!(first[1], Some(44.0));
        assert_eq!((first[8], first[9]), (Some(0.0), Some(1.0)));
        assert_eq!(first[10], Some(1.0));

        let second = encoded.rows[1];
        assert_eq!(second[0], Some(0.0));
        assert_eq!((second[8], second[9]), (Some(1.0), Some(0.0)));
        assert_eq!(second[10], Some(0.0));
    }

    #[test]
    fn test_encode_keeps_missing_features() {
        let encoded = encode_frame(&raw_frame()).unwrap();
        let third = encoded.rows[2];
        assert_eq!(third[0], None);
        assert_eq!(third[1], None);
        assert_eq!((third[8], third[9]), (Some(0.0), Some(0.0)));
    }

    #[test]
    fn test_encode_drops_missing_labels() {
        let mut df = raw_frame();
        df.with_column(Column::new("Response".into(), [Some(1i64), None, Some(0)]))
            .unwrap();
        let encoded = encode_frame(&df).unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded.dropped_rows, 1);
        assert_eq!(encoded.labels, vec![1, 0]);
    }

    #[test]
    fn test_encode_rejects_unknown_category() {
        let mut df = raw_frame();
        df.with_column(Column::new(
            "Vehicle_Age".into(),
            ["> 2 Years", "ancient", "1-2 Year"],
        ))
        .unwrap();
        assert!(matches!(
            encode_frame(&df),
            Err(TransformationError::UnknownCategory { column, value })
                if column == "Vehicle_Age" && value == "ancient"
        ));
    }

    #[test]
    fn test_encode_requires_every_column() {
        let df = raw_frame().drop("Vintage").unwrap();
        assert!(matches!(
            encode_frame(&df),
            Err(TransformationError::MissingColumn(c)) if c == "Vintage"
        ));
    }
}
