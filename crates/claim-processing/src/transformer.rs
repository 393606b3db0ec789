//! Fitted feature transformer.
//!
//! The transformer is fit on the training split only. It stores:
//!
//! - a median fill value per feature, used for missing values
//! - standard-scaler parameters for `Age` and `Vintage`
//! - min-max parameters for `Annual_Premium`
//!
//! Every other feature passes through unchanged. Applying the transformer
//! takes `&self`, so transforming test or inference data cannot alter it.

use crate::constants::*;
use crate::encoding::EncodedRow;
use crate::error::TransformationError;
use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Scaling applied to a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaling {
    Passthrough,
    /// `(x - mean) / std`
    Standard { mean: f64, std: f64 },
    /// `(x - min) / (max - min)`
    MinMax { min: f64, max: f64 },
}

impl Scaling {
    fn apply(&self, value: f64) -> f64 {
        match *self {
            Self::Passthrough => value,
            Self::Standard { mean, std } => (value - mean) / std,
            Self::MinMax { min, max } => (value - min) / (max - min),
        }
    }
}

/// Fitted parameters of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    pub column: String,
    pub fill_value: f64,
    pub scaling: Scaling,
}

/// Imputation and scaling fitted on training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    features: Vec<FeatureParams>,
    fitted_rows: usize,
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl FeatureTransformer {
    /// Fit on encoded training rows.
    ///
    /// `processing_steps` receives one line per fitted column.
    pub fn fit(
        rows: &[EncodedRow],
        processing_steps: &mut Vec<String>,
    ) -> Result<Self, TransformationError> {
        if rows.is_empty() {
            return Err(TransformationError::EmptyTrainingSplit);
        }

        let mut features = Vec::with_capacity(FEATURE_COUNT);
        for (index, column) in FEATURE_COLUMNS.iter().enumerate() {
            let mut observed: Vec<f64> = rows.iter().filter_map(|row| row[index]).collect();
            let missing = rows.len() - observed.len();
            let fill_value = median(&mut observed)
                .ok_or_else(|| TransformationError::NoObservedValues(column.to_string()))?;

            if missing > 0 {
                processing_steps.push(format!(
                    "Filled {} missing values in '{}' with median: {:.4}",
                    missing, column, fill_value
                ));
            }

            let imputed: Vec<f64> = rows.iter().map(|row| row[index].unwrap_or(fill_value)).collect();
            let scaling = if STANDARD_SCALED_COLUMNS.contains(column) {
                let n = imputed.len() as f64;
                let mean = imputed.iter().sum::<f64>() / n;
                let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
                processing_steps.push(format!(
                    "Standard-scaled '{}' (mean {:.4}, std {:.4})",
                    column, mean, std
                ));
                Scaling::Standard { mean, std }
            } else if MIN_MAX_SCALED_COLUMNS.contains(column) {
                let min = imputed.iter().copied().fold(f64::INFINITY, f64::min);
                let mut max = imputed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max <= min {
                    max = min + 1.0;
                }
                processing_steps.push(format!(
                    "Min-max scaled '{}' (min {:.2}, max {:.2})",
                    column, min, max
                ));
                Scaling::MinMax { min, max }
            } else {
                Scaling::Passthrough
            };

            features.push(FeatureParams {
                column: column.to_string(),
                fill_value,
                scaling,
            });
        }

        Ok(Self {
            features,
            fitted_rows: rows.len(),
        })
    }

    /// Number of rows the transformer was fit on.
    pub fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    pub fn features(&self) -> &[FeatureParams] {
        &self.features
    }

    /// Impute and scale one encoded row.
    pub fn transform_row(&self, row: &EncodedRow) -> Vec<f64> {
        self.features
            .iter()
            .zip(row.iter())
            .map(|(params, value)| params.scaling.apply(value.unwrap_or(params.fill_value)))
            .collect()
    }

    pub fn transform_rows(&self, rows: &[EncodedRow]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Scale a complete inference record.
    pub fn transform_record(&self, record: &Record) -> Vec<f64> {
        self.transform_row(&record.to_features().map(Some))
    }

    /// Check a deserialized transformer still matches the feature layout.
    pub fn check_layout(&self) -> Result<(), TransformationError> {
        if self.features.len() != FEATURE_COUNT {
            return Err(TransformationError::FeatureCount {
                expected: FEATURE_COUNT,
                actual: self.features.len(),
            });
        }
        for (params, expected) in self.features.iter().zip(FEATURE_COLUMNS) {
            if params.column != expected {
                return Err(TransformationError::MissingColumn(expected.to_string()));
            }
        }
        Ok(())
    }
}
