//! Data validation: schema checks and train/test drift detection.

use crate::config::PipelineConfig;
use crate::constants::{ColumnKind, RAW_SCHEMA, raw_column_kind};
use crate::drift::{ks_two_sample, total_variation_distance};
use crate::error::{TransformationError, ValidationError};
use crate::layout::RunLayout;
use crate::store::{ArtifactStore, ArtifactStoreExt};
use crate::types::{ColumnDrift, DriftTest, IngestionArtifact, ValidationReport};
use crate::utils::{is_numeric_dtype, is_string_dtype, numeric_values, string_values};
use chrono::Utc;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Validation stage of a training run.
pub struct DataValidation<'a> {
    config: &'a PipelineConfig,
    layout: &'a RunLayout,
    store: &'a dyn ArtifactStore,
}

impl<'a> DataValidation<'a> {
    pub fn new(config: &'a PipelineConfig, layout: &'a RunLayout, store: &'a dyn ArtifactStore) -> Self {
        Self {
            config,
            layout,
            store,
        }
    }

    fn load_split(&self, key: &str) -> Result<DataFrame, ValidationError> {
        self.store
            .load_frame(key)
            .map_err(|source| ValidationError::SplitUnavailable {
                key: key.to_string(),
                source,
            })
    }

    /// Validate both splits and persist the report.
    ///
    /// A dataset that fails the checks yields `is_valid == false`; only
    /// unreadable inputs are errors.
    pub fn validate(&self, ingestion: &IngestionArtifact) -> Result<ValidationReport, ValidationError> {
        let train = self.load_split(&ingestion.train_key)?;
        let test = self.load_split(&ingestion.test_key)?;

        info!("Step 1: Checking schema of train and test splits");
        let mut schema_issues = check_schema("train", &train);
        schema_issues.extend(check_schema("test", &test));
        for issue in &schema_issues {
            warn!("Schema issue: {}", issue);
        }

        info!("Step 2: Testing {} columns for drift", RAW_SCHEMA.len());
        let drift = self.detect_drift(&train, &test)?;
        let drifted_columns = drift.values().filter(|d| d.drift_detected).count();
        let drifted_share = if drift.is_empty() {
            0.0
        } else {
            drifted_columns as f64 / drift.len() as f64
        };

        let is_valid = schema_issues.is_empty() && drifted_share < self.config.max_drift_share;
        let message = if !schema_issues.is_empty() {
            format!("{} schema issue(s) found", schema_issues.len())
        } else if !is_valid {
            format!(
                "Drift detected in {} of {} columns ({:.0}%)",
                drifted_columns,
                drift.len(),
                drifted_share * 100.0
            )
        } else {
            format!("Dataset is valid; {} column(s) drifted", drifted_columns)
        };

        let report = ValidationReport {
            run_id: self.layout.run_id().to_string(),
            is_valid,
            schema_issues,
            drift,
            drifted_columns,
            drifted_share,
            message,
            report_key: self.layout.validation_report_key(),
            generated_at: Utc::now(),
        };

        self.store.save_json(&report.report_key, &report)?;
        if report.is_valid {
            info!("Validation passed: {}", report.message);
        } else {
            warn!("Validation failed: {}", report.message);
        }
        Ok(report)
    }

    fn detect_drift(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<BTreeMap<String, ColumnDrift>, ValidationError> {
        let mut drift = BTreeMap::new();

        for (column, kind) in RAW_SCHEMA {
            let (Ok(reference), Ok(current)) = (train.column(column), test.column(column)) else {
                continue;
            };
            let result = match kind {
                ColumnKind::Numeric => {
                    if !is_numeric_dtype(reference.dtype()) || !is_numeric_dtype(current.dtype()) {
                        continue;
                    }
                    let reference = observed(numeric_values(train, column), column)?;
                    let current = observed(numeric_values(test, column), column)?;
                    ks_two_sample(&reference, &current).map(|ks| ColumnDrift {
                        test: DriftTest::KolmogorovSmirnov,
                        statistic: ks.statistic,
                        p_value: Some(ks.p_value),
                        drift_detected: ks.p_value < self.config.drift_p_value_threshold,
                    })
                }
                ColumnKind::Categorical => {
                    if !is_string_dtype(reference.dtype()) || !is_string_dtype(current.dtype()) {
                        continue;
                    }
                    let reference = string_values(train, column).map_err(|e| malformed(column, e))?;
                    let current = string_values(test, column).map_err(|e| malformed(column, e))?;
                    total_variation_distance(&reference, &current).map(|distance| ColumnDrift {
                        test: DriftTest::TotalVariation,
                        statistic: distance,
                        p_value: None,
                        drift_detected: distance > self.config.categorical_drift_threshold,
                    })
                }
            };

            if let Some(result) = result {
                debug!(
                    "Column '{}': statistic {:.4}, drift {}",
                    column, result.statistic, result.drift_detected
                );
                drift.insert(column.to_string(), result);
            }
        }

        Ok(drift)
    }
}

fn malformed(column: &str, source: TransformationError) -> ValidationError {
    ValidationError::Malformed {
        column: column.to_string(),
        source,
    }
}

fn observed(
    values: Result<Vec<Option<f64>>, TransformationError>,
    column: &str,
) -> Result<Vec<f64>, ValidationError> {
    Ok(values
        .map_err(|e| malformed(column, e))?
        .into_iter()
        .flatten()
        .collect())
}

/// Compare a split's columns and dtypes against the declared raw schema.
pub fn check_schema(split: &str, df: &DataFrame) -> Vec<String> {
    let mut issues = Vec::new();

    if df.width() != RAW_SCHEMA.len() {
        issues.push(format!(
            "{split}: expected {} columns, found {}",
            RAW_SCHEMA.len(),
            df.width()
        ));
    }

    for (column, kind) in RAW_SCHEMA {
        match df.column(column) {
            Err(_) => issues.push(format!("{split}: missing column '{column}'")),
            Ok(col) => {
                // All-null columns carry no dtype information after a CSV round trip.
                if col.null_count() == col.len() {
                    continue;
                }
                let ok = match kind {
                    ColumnKind::Numeric => is_numeric_dtype(col.dtype()),
                    ColumnKind::Categorical => is_string_dtype(col.dtype()),
                };
                if !ok {
                    issues.push(format!(
                        "{split}: column '{column}' has dtype {}, expected {:?}",
                        col.dtype(),
                        kind
                    ));
                }
            }
        }
    }

    for name in df.get_column_names() {
        if raw_column_kind(name.as_str()).is_none() {
            issues.push(format!("{split}: unexpected column '{name}'"));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn raw_frame(ages: Vec<i64>, genders: Vec<&str>) -> DataFrame {
        let n = ages.len();
        df![
            "id" => (0..n as i64).collect::<Vec<_>>(),
            "Gender" => genders,
            "Age" => ages,
            "Driving_License" => vec![1i64; n],
            "Region_Code" => vec![28.0; n],
            "Previously_Insured" => (0..n as i64).map(|i| i % 2).collect::<Vec<_>>(),
            "Vehicle_Age" => vec!["1-2 Year"; n],
            "Vehicle_Damage" => (0..n).map(|i| if i % 2 == 0 { "Yes" } else { "No" }).collect::<Vec<_>>(),
            "Annual_Premium" => (0..n).map(|i| 20000.0 + i as f64).collect::<Vec<_>>(),
            "Policy_Sales_Channel" => vec![152.0; n],
            "Vintage" => (0..n as i64).map(|i| 10 + i % 290).collect::<Vec<_>>(),
            "Response" => (0..n as i64).map(|i| i % 2).collect::<Vec<_>>(),
        ]
        .unwrap()
    }

    fn run(train: DataFrame, test: DataFrame) -> (ValidationReport, InMemoryStore) {
        let store = InMemoryStore::new();
        let layout = RunLayout::new("run");
        let config = PipelineConfig::default();
        store.save_frame(&layout.train_key(), &mut train.clone()).unwrap();
        store.save_frame(&layout.test_key(), &mut test.clone()).unwrap();
        let ingestion = IngestionArtifact {
            feature_store_key: layout.feature_store_key(),
            train_key: layout.train_key(),
            test_key: layout.test_key(),
            rows: train.height() + test.height(),
            train_rows: train.height(),
            test_rows: test.height(),
        };
        let report = DataValidation::new(&config, &layout, &store)
            .validate(&ingestion)
            .unwrap();
        (report, store)
    }

    #[test]
    fn test_same_distribution_is_valid() {
        let ages: Vec<i64> = (0..200).map(|i| 20 + i % 60).collect();
        let genders: Vec<&str> = (0..200).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect();
        let (report, store) = run(raw_frame(ages.clone(), genders.clone()), raw_frame(ages, genders));

        assert!(report.is_valid, "{}", report.message);
        assert!(report.schema_issues.is_empty());
        assert_eq!(report.drift.len(), 12);
        assert!(store.exists("run/data_validation/report.json").unwrap());
    }

    #[test]
    fn test_missing_column_invalidates() {
        let ages: Vec<i64> = (0..50).map(|i| 20 + i).collect();
        let genders = vec!["Male"; 50];
        let train = raw_frame(ages.clone(), genders.clone());
        let test = raw_frame(ages, genders).drop("Vintage").unwrap();
        let (report, _) = run(train, test);

        assert!(!report.is_valid);
        assert!(report.schema_issues.iter().any(|i| i.contains("missing column 'Vintage'")));
        assert!(report.schema_issues.iter().any(|i| i.contains("expected 12 columns")));
    }

    #[test]
    fn test_wrong_dtype_invalidates() {
        let ages: Vec<i64> = (0..50).map(|i| 20 + i).collect();
        let genders = vec!["Male"; 50];
        let train = raw_frame(ages.clone(), genders.clone());
        let mut test = raw_frame(ages, genders);
        test.with_column(Column::new("Age".into(), vec!["old"; 50])).unwrap();
        let (report, _) = run(train, test);

        assert!(!report.is_valid);
        assert!(report.schema_issues.iter().any(|i| i.contains("'Age'")));
    }

    #[test]
    fn test_widespread_drift_invalidates() {
        let n = 200;
        let train = raw_frame((0..n).map(|i| 20 + i % 20).collect(), vec!["Male"; n as usize]);
        let mut test = raw_frame((0..n).map(|i| 70 + i % 20).collect(), vec!["Female"; n as usize]);
        // Shift every numeric column so most of the schema drifts.
        for column in ["Driving_License", "Previously_Insured", "Response"] {
            test.with_column(Column::new(column.into(), vec![0i64; n as usize])).unwrap();
        }
        test.with_column(Column::new("id".into(), (1000..1000 + n).collect::<Vec<i64>>()))
            .unwrap();
        test.with_column(Column::new("Region_Code".into(), vec![3.0; n as usize]))
            .unwrap();
        test.with_column(Column::new("Annual_Premium".into(), vec![90000.0; n as usize]))
            .unwrap();
        test.with_column(Column::new("Vehicle_Age".into(), vec!["> 2 Years"; n as usize]))
            .unwrap();
        let (report, _) = run(train, test);

        assert!(report.schema_issues.is_empty());
        assert!(!report.is_valid);
        assert!(report.drifted_share >= 0.5);
        assert!(report.drifted().contains(&"Age"));
        assert!(report.drifted().contains(&"Gender"));
    }

    #[test]
    fn test_missing_split_is_error() {
        let store = InMemoryStore::new();
        let layout = RunLayout::new("run");
        let config = PipelineConfig::default();
        let ingestion = IngestionArtifact {
            feature_store_key: layout.feature_store_key(),
            train_key: layout.train_key(),
            test_key: layout.test_key(),
            rows: 0,
            train_rows: 0,
            test_rows: 0,
        };
        let err = DataValidation::new(&config, &layout, &store)
            .validate(&ingestion)
            .unwrap_err();
        assert_eq!(err.error_code(), "SPLIT_UNAVAILABLE");
    }
}
