//! Seeded generator of raw claim data with a known labelling rule.
//!
//! The label is `1` when the vehicle was damaged and the applicant was not
//! previously insured, flipped for a `noise` fraction of rows. A forest can
//! learn this rule, which makes the generator useful for end-to-end runs.

use crate::constants::*;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SALES_CHANNELS: [f64; 6] = [26.0, 124.0, 152.0, 156.0, 160.0, 122.0];

/// Generator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticClaims {
    pub rows: usize,
    pub seed: u64,
    /// Share of labels flipped against the rule.
    pub noise: f64,
    /// Share of `Age` and `Annual_Premium` values left empty.
    pub missing_rate: f64,
}

impl Default for SyntheticClaims {
    fn default() -> Self {
        Self {
            rows: 1000,
            seed: 7,
            noise: 0.05,
            missing_rate: 0.0,
        }
    }
}

/// Label assigned by the rule before noise.
pub fn expected_label(vehicle_damage: bool, previously_insured: bool) -> u8 {
    u8::from(vehicle_damage && !previously_insured)
}

impl SyntheticClaims {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self {
            rows,
            seed,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    #[must_use]
    pub fn missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate;
        self
    }

    /// Generate a raw frame in the declared raw schema.
    ///
    /// Fails when `noise` or `missing_rate` is not a probability.
    pub fn generate(&self) -> PolarsResult<DataFrame> {
        for (name, rate) in [("noise", self.noise), ("missing_rate", self.missing_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(PolarsError::InvalidOperation(
                    format!("{name} must be within [0, 1], got {rate}").into(),
                ));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.rows;

        let mut id = Vec::with_capacity(n);
        let mut gender = Vec::with_capacity(n);
        let mut age: Vec<Option<i64>> = Vec::with_capacity(n);
        let mut driving_license = Vec::with_capacity(n);
        let mut region_code = Vec::with_capacity(n);
        let mut previously_insured = Vec::with_capacity(n);
        let mut vehicle_age = Vec::with_capacity(n);
        let mut vehicle_damage = Vec::with_capacity(n);
        let mut annual_premium: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut policy_sales_channel = Vec::with_capacity(n);
        let mut vintage = Vec::with_capacity(n);
        let mut response = Vec::with_capacity(n);

        for i in 0..n {
            id.push(i as i64 + 1);
            gender.push(if rng.gen_bool(0.54) { GENDER_MALE } else { GENDER_FEMALE });

            let applicant_age = rng.gen_range(20i64..=85);
            age.push((!rng.gen_bool(self.missing_rate)).then_some(applicant_age));
            driving_license.push(i64::from(rng.gen_bool(0.98)));
            region_code.push(rng.gen_range(0..=52) as f64);

            let insured = rng.gen_bool(0.46);
            previously_insured.push(i64::from(insured));

            let bucket = rng.gen_range(0..10);
            vehicle_age.push(match bucket {
                0..=3 => VEHICLE_AGE_LT_1,
                4..=8 => VEHICLE_AGE_1_2,
                _ => VEHICLE_AGE_GT_2,
            });

            let damaged = rng.gen_bool(0.5);
            vehicle_damage.push(if damaged { DAMAGE_YES } else { DAMAGE_NO });

            let premium = rng.gen_range(2630.0..60000.0f64).round();
            annual_premium.push((!rng.gen_bool(self.missing_rate)).then_some(premium));
            policy_sales_channel.push(SALES_CHANNELS[rng.gen_range(0..SALES_CHANNELS.len())]);
            vintage.push(rng.gen_range(10i64..=299));

            let mut label = expected_label(damaged, insured);
            if rng.gen_bool(self.noise) {
                label = 1 - label;
            }
            response.push(i64::from(label));
        }

        DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), id),
            Column::new(GENDER.into(), gender),
            Column::new(AGE.into(), age),
            Column::new(DRIVING_LICENSE.into(), driving_license),
            Column::new(REGION_CODE.into(), region_code),
            Column::new(PREVIOUSLY_INSURED.into(), previously_insured),
            Column::new(VEHICLE_AGE.into(), vehicle_age),
            Column::new(VEHICLE_DAMAGE.into(), vehicle_damage),
            Column::new(ANNUAL_PREMIUM.into(), annual_premium),
            Column::new(POLICY_SALES_CHANNEL.into(), policy_sales_channel),
            Column::new(VINTAGE.into(), vintage),
            Column::new(TARGET_COLUMN.into(), response),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::check_schema;

    #[test]
    fn test_generated_frame_matches_raw_schema() {
        let df = SyntheticClaims::new(100, 1).generate().unwrap();
        assert_eq!(df.height(), 100);
        assert!(check_schema("synthetic", &df).is_empty());
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = SyntheticClaims::new(50, 3).generate().unwrap();
        let b = SyntheticClaims::new(50, 3).generate().unwrap();
        let c = SyntheticClaims::new(50, 4).generate().unwrap();
        assert!(a.equals_missing(&b));
        assert!(!a.equals_missing(&c));
    }

    #[test]
    fn test_rates_outside_unit_interval_rejected() {
        assert!(SyntheticClaims::new(10, 1).noise(1.5).generate().is_err());
        assert!(SyntheticClaims::new(10, 1).noise(-0.1).generate().is_err());
        assert!(SyntheticClaims::new(10, 1).missing_rate(f64::NAN).generate().is_err());
        assert!(SyntheticClaims::new(10, 1).noise(1.0).missing_rate(0.0).generate().is_ok());
    }

    #[test]
    fn test_missing_rate_leaves_nulls() {
        let df = SyntheticClaims::new(400, 2).missing_rate(0.2).generate().unwrap();
        let nulls = df.column(AGE).unwrap().null_count();
        assert!(nulls > 20 && nulls < 150, "{nulls} nulls");
    }

    #[test]
    fn test_expected_label_rule() {
        assert_eq!(expected_label(true, false), 1);
        assert_eq!(expected_label(true, true), 0);
        assert_eq!(expected_label(false, false), 0);
    }
}
