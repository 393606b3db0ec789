//! Schema registry and default values shared by every pipeline stage.
//!
//! Nothing in here does work; stages look up column names, artifact file
//! names and defaults from this module so the layout is declared once.

// =============================================================================
// Raw schema
// =============================================================================

/// Label column in raw and transformed data.
pub const TARGET_COLUMN: &str = "Response";

/// Row identifier dropped during encoding.
pub const ID_COLUMN: &str = "id";

pub const GENDER: &str = "Gender";
pub const AGE: &str = "Age";
pub const DRIVING_LICENSE: &str = "Driving_License";
pub const REGION_CODE: &str = "Region_Code";
pub const PREVIOUSLY_INSURED: &str = "Previously_Insured";
pub const VEHICLE_AGE: &str = "Vehicle_Age";
pub const VEHICLE_DAMAGE: &str = "Vehicle_Damage";
pub const ANNUAL_PREMIUM: &str = "Annual_Premium";
pub const POLICY_SALES_CHANNEL: &str = "Policy_Sales_Channel";
pub const VINTAGE: &str = "Vintage";

/// How a raw column is stored and compared for drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Declared raw schema in file order.
pub const RAW_SCHEMA: [(&str, ColumnKind); 12] = [
    (ID_COLUMN, ColumnKind::Numeric),
    (GENDER, ColumnKind::Categorical),
    (AGE, ColumnKind::Numeric),
    (DRIVING_LICENSE, ColumnKind::Numeric),
    (REGION_CODE, ColumnKind::Numeric),
    (PREVIOUSLY_INSURED, ColumnKind::Numeric),
    (VEHICLE_AGE, ColumnKind::Categorical),
    (VEHICLE_DAMAGE, ColumnKind::Categorical),
    (ANNUAL_PREMIUM, ColumnKind::Numeric),
    (POLICY_SALES_CHANNEL, ColumnKind::Numeric),
    (VINTAGE, ColumnKind::Numeric),
    (TARGET_COLUMN, ColumnKind::Numeric),
];

/// Looks up the declared kind of a raw column.
pub fn raw_column_kind(name: &str) -> Option<ColumnKind> {
    RAW_SCHEMA
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, kind)| *kind)
}

// =============================================================================
// Model-ready schema
// =============================================================================

pub const VEHICLE_AGE_LT_1_YEAR: &str = "Vehicle_Age_lt_1_Year";
pub const VEHICLE_AGE_GT_2_YEARS: &str = "Vehicle_Age_gt_2_Years";
pub const VEHICLE_DAMAGE_YES: &str = "Vehicle_Damage_Yes";

/// Number of model-ready feature columns.
pub const FEATURE_COUNT: usize = 11;

/// Model-ready feature columns. Order is part of the artifact contract.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    GENDER,
    AGE,
    DRIVING_LICENSE,
    REGION_CODE,
    PREVIOUSLY_INSURED,
    ANNUAL_PREMIUM,
    POLICY_SALES_CHANNEL,
    VINTAGE,
    VEHICLE_AGE_LT_1_YEAR,
    VEHICLE_AGE_GT_2_YEARS,
    VEHICLE_DAMAGE_YES,
];

/// Features standardized to zero mean and unit variance.
pub const STANDARD_SCALED_COLUMNS: [&str; 2] = [AGE, VINTAGE];

/// Features rescaled into `[0, 1]`.
pub const MIN_MAX_SCALED_COLUMNS: [&str; 1] = [ANNUAL_PREMIUM];

/// Position of a feature column in [`FEATURE_COLUMNS`].
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|column| *column == name)
}

// Raw category spellings.
pub const GENDER_MALE: &str = "Male";
pub const GENDER_FEMALE: &str = "Female";
pub const VEHICLE_AGE_LT_1: &str = "< 1 Year";
pub const VEHICLE_AGE_1_2: &str = "1-2 Year";
pub const VEHICLE_AGE_GT_2: &str = "> 2 Years";
pub const DAMAGE_YES: &str = "Yes";
pub const DAMAGE_NO: &str = "No";

// =============================================================================
// Artifact layout
// =============================================================================

pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
/// Timestamp format of run directory names.
pub const RUN_ID_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const DATA_INGESTION_DIR: &str = "data_ingestion";
pub const FEATURE_STORE_DIR: &str = "feature_store";
pub const INGESTED_DIR: &str = "ingested";
pub const RAW_DATA_FILE: &str = "data.csv";
pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";

pub const DATA_VALIDATION_DIR: &str = "data_validation";
pub const VALIDATION_REPORT_FILE: &str = "report.json";

pub const DATA_TRANSFORMATION_DIR: &str = "data_transformation";
pub const TRANSFORMED_DATA_DIR: &str = "transformed";
pub const TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";

pub const MODEL_TRAINER_DIR: &str = "model_trainer";
pub const TRAINED_MODEL_DIR: &str = "trained_model";
pub const MODEL_FILE: &str = "model.json";

pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

pub const DEPLOYED_DIR: &str = "deployed";
pub const RELEASES_DIR: &str = "releases";
pub const MANIFEST_FILE: &str = "current.json";

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;
pub const DEFAULT_SPLIT_SEED: u64 = 42;
pub const DEFAULT_DRIFT_P_VALUE: f64 = 0.05;
pub const DEFAULT_CATEGORICAL_DRIFT: f64 = 0.1;
pub const DEFAULT_MAX_DRIFT_SHARE: f64 = 0.5;
pub const DEFAULT_EXPECTED_ACCURACY: f64 = 0.6;
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 0.02;

pub const DEFAULT_N_ESTIMATORS: usize = 200;
pub const DEFAULT_MIN_SAMPLES_SPLIT: usize = 7;
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 6;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_RANDOM_STATE: u64 = 101;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_layout() {
        assert_eq!(FEATURE_COLUMNS.len(), FEATURE_COUNT);
        assert_eq!(feature_index(GENDER), Some(0));
        assert_eq!(feature_index(VEHICLE_DAMAGE_YES), Some(10));
        assert_eq!(feature_index(VEHICLE_AGE), None);
    }

    #[test]
    fn test_scaled_columns_are_features() {
        for column in STANDARD_SCALED_COLUMNS.iter().chain(MIN_MAX_SCALED_COLUMNS.iter()) {
            assert!(feature_index(column).is_some(), "{column} is not a feature");
        }
    }

    #[test]
    fn test_raw_column_kind() {
        assert_eq!(raw_column_kind(VEHICLE_AGE), Some(ColumnKind::Categorical));
        assert_eq!(raw_column_kind(AGE), Some(ColumnKind::Numeric));
        assert_eq!(raw_column_kind("Unknown"), None);
    }
}
