//! Core types shared between the pipeline stages.

use crate::constants::*;
use crate::error::RecordError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Raw categories
// =============================================================================

/// Applicant gender as it appears in raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Parse the raw spelling (`"Male"` / `"Female"`, case-insensitive).
    pub fn from_raw(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(GENDER_MALE) {
            Some(Self::Male)
        } else if value.eq_ignore_ascii_case(GENDER_FEMALE) {
            Some(Self::Female)
        } else {
            None
        }
    }

    /// Numeric encoding: Male = 1, Female = 0.
    pub fn code(&self) -> u8 {
        match self {
            Self::Male => 1,
            Self::Female => 0,
        }
    }

    pub fn as_raw(&self) -> &'static str {
        match self {
            Self::Male => GENDER_MALE,
            Self::Female => GENDER_FEMALE,
        }
    }
}

/// Vehicle age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleAge {
    LessThanOneYear,
    OneToTwoYears,
    MoreThanTwoYears,
}

impl VehicleAge {
    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim() {
            VEHICLE_AGE_LT_1 => Some(Self::LessThanOneYear),
            VEHICLE_AGE_1_2 => Some(Self::OneToTwoYears),
            VEHICLE_AGE_GT_2 => Some(Self::MoreThanTwoYears),
            _ => None,
        }
    }

    /// `(lt_1_year, gt_2_years)` indicator pair; the middle bucket is `(0, 0)`.
    pub fn indicators(&self) -> (u8, u8) {
        match self {
            Self::LessThanOneYear => (1, 0),
            Self::OneToTwoYears => (0, 0),
            Self::MoreThanTwoYears => (0, 1),
        }
    }

    pub fn as_raw(&self) -> &'static str {
        match self {
            Self::LessThanOneYear => VEHICLE_AGE_LT_1,
            Self::OneToTwoYears => VEHICLE_AGE_1_2,
            Self::MoreThanTwoYears => VEHICLE_AGE_GT_2,
        }
    }
}

/// Parse the raw vehicle-damage flag (`"Yes"` / `"No"`).
pub fn parse_damage(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(DAMAGE_YES) {
        Some(true)
    } else if value.eq_ignore_ascii_case(DAMAGE_NO) {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Model-ready record
// =============================================================================

/// One applicant in the model-ready eleven-feature layout.
///
/// Field order matches [`FEATURE_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub gender: u8,
    pub age: u32,
    pub driving_license: u8,
    pub region_code: u32,
    pub previously_insured: u8,
    pub annual_premium: f64,
    pub policy_sales_channel: u32,
    pub vintage: u32,
    pub vehicle_age_lt_1_year: u8,
    pub vehicle_age_gt_2_years: u8,
    pub vehicle_damage_yes: u8,
}

pub const AGE_RANGE: (f64, f64) = (18.0, 100.0);
pub const REGION_CODE_RANGE: (f64, f64) = (0.0, 52.0);
pub const ANNUAL_PREMIUM_RANGE: (f64, f64) = (2000.0, 100000.0);
pub const POLICY_SALES_CHANNEL_RANGE: (f64, f64) = (1.0, 200.0);
pub const VINTAGE_RANGE: (f64, f64) = (10.0, 300.0);

impl Record {
    /// Check every field against the accepted input ranges.
    pub fn validate(&self) -> Result<(), RecordError> {
        for (field, value) in [
            (GENDER, self.gender),
            (DRIVING_LICENSE, self.driving_license),
            (PREVIOUSLY_INSURED, self.previously_insured),
            (VEHICLE_AGE_LT_1_YEAR, self.vehicle_age_lt_1_year),
            (VEHICLE_AGE_GT_2_YEARS, self.vehicle_age_gt_2_years),
            (VEHICLE_DAMAGE_YES, self.vehicle_damage_yes),
        ] {
            if value > 1 {
                return Err(RecordError::NotBinary { field, value });
            }
        }

        if self.vehicle_age_lt_1_year == 1 && self.vehicle_age_gt_2_years == 1 {
            return Err(RecordError::ConflictingVehicleAge);
        }

        for (field, value, (min, max)) in [
            (AGE, f64::from(self.age), AGE_RANGE),
            (REGION_CODE, f64::from(self.region_code), REGION_CODE_RANGE),
            (ANNUAL_PREMIUM, self.annual_premium, ANNUAL_PREMIUM_RANGE),
            (POLICY_SALES_CHANNEL, f64::from(self.policy_sales_channel), POLICY_SALES_CHANNEL_RANGE),
            (VINTAGE, f64::from(self.vintage), VINTAGE_RANGE),
        ] {
            if !value.is_finite() {
                return Err(RecordError::NotFinite { field });
            }
            if value < min || value > max {
                return Err(RecordError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        Ok(())
    }

    /// Feature vector in [`FEATURE_COLUMNS`] order.
    pub fn to_features(&self) -> [f64; FEATURE_COUNT] {
        [
            f64::from(self.gender),
            f64::from(self.age),
            f64::from(self.driving_license),
            f64::from(self.region_code),
            f64::from(self.previously_insured),
            self.annual_premium,
            f64::from(self.policy_sales_channel),
            f64::from(self.vintage),
            f64::from(self.vehicle_age_lt_1_year),
            f64::from(self.vehicle_age_gt_2_years),
            f64::from(self.vehicle_damage_yes),
        ]
    }
}

/// Applicant details in their human-facing form.
///
/// Converting into a [`Record`] applies the categorical encodings: gender
/// to 0/1, vehicle age to two indicators, damage to 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApplicantForm {
    pub gender: Gender,
    pub age: u32,
    pub has_driving_license: bool,
    pub region_code: u32,
    pub previously_insured: bool,
    pub vehicle_age: VehicleAge,
    pub vehicle_damage: bool,
    pub annual_premium: f64,
    pub policy_sales_channel: u32,
    pub vintage: u32,
}

impl From<ApplicantForm> for Record {
    fn from(form: ApplicantForm) -> Self {
        let (lt_1, gt_2) = form.vehicle_age.indicators();
        Record {
            gender: form.gender.code(),
            age: form.age,
            driving_license: u8::from(form.has_driving_license),
            region_code: form.region_code,
            previously_insured: u8::from(form.previously_insured),
            annual_premium: form.annual_premium,
            policy_sales_channel: form.policy_sales_channel,
            vintage: form.vintage,
            vehicle_age_lt_1_year: lt_1,
            vehicle_age_gt_2_years: gt_2,
            vehicle_damage_yes: u8::from(form.vehicle_damage),
        }
    }
}

// =============================================================================
// Stage artifacts
// =============================================================================

/// Output of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub feature_store_key: String,
    pub train_key: String,
    pub test_key: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Statistical test used to compare a column between train and test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTest {
    /// Two-sample Kolmogorov-Smirnov on numeric values.
    KolmogorovSmirnov,
    /// Total variation distance between category frequencies.
    TotalVariation,
}

/// Drift outcome for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub test: DriftTest,
    /// KS statistic or total variation distance.
    pub statistic: f64,
    /// Only reported by the KS test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub drift_detected: bool,
}

/// Output of the validation stage, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub is_valid: bool,
    pub schema_issues: Vec<String>,
    pub drift: BTreeMap<String, ColumnDrift>,
    pub drifted_columns: usize,
    pub drifted_share: f64,
    pub message: String,
    pub report_key: String,
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Names of drifted columns.
    pub fn drifted(&self) -> Vec<&str> {
        self.drift
            .iter()
            .filter(|(_, d)| d.drift_detected)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Output of the transformation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    pub transformer_key: String,
    pub train_key: String,
    pub test_key: String,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows removed because their label was missing.
    pub dropped_rows: usize,
    /// Human-readable log of imputation and scaling steps.
    pub processing_steps: Vec<String>,
}
