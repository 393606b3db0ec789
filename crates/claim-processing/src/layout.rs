//! Key namespace of a single training run and of the deployed slot.

use crate::constants::*;
use crate::error::StoreError;
use crate::store::{ArtifactStore, join_key};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Artifact keys owned by one pipeline run.
///
/// Every stage output lives under `<run_id>/`; only the pusher writes
/// outside of it, into the keys exposed by [`DeployedLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLayout {
    run_id: String,
}

impl RunLayout {
    /// Use an explicit run id.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Run id derived from `timestamp` in `MM_DD_YYYY_HH_MM_SS` form.
    pub fn from_timestamp(timestamp: DateTime<Local>) -> Self {
        Self::new(timestamp.format(RUN_ID_FORMAT).to_string())
    }

    /// Allocate a run directory that does not exist in `store` yet.
    ///
    /// Two runs started within the same second get `_1`, `_2`, ... suffixes.
    pub fn allocate(store: &dyn ArtifactStore, timestamp: DateTime<Local>) -> Result<Self, StoreError> {
        let base = Self::from_timestamp(timestamp);
        if !store.has_prefix(base.run_id())? {
            return Ok(base);
        }

        let mut suffix = 1usize;
        loop {
            let candidate = Self::new(format!("{}_{}", base.run_id, suffix));
            if !store.has_prefix(candidate.run_id())? {
                debug!("Run directory {} taken, using {}", base.run_id, candidate.run_id);
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn key(&self, segments: &[&str]) -> String {
        join_key(std::iter::once(self.run_id.as_str()).chain(segments.iter().copied()))
    }

    pub fn feature_store_key(&self) -> String {
        self.key(&[DATA_INGESTION_DIR, FEATURE_STORE_DIR, RAW_DATA_FILE])
    }

    pub fn train_key(&self) -> String {
        self.key(&[DATA_INGESTION_DIR, INGESTED_DIR, TRAIN_FILE])
    }

    pub fn test_key(&self) -> String {
        self.key(&[DATA_INGESTION_DIR, INGESTED_DIR, TEST_FILE])
    }

    pub fn validation_report_key(&self) -> String {
        self.key(&[DATA_VALIDATION_DIR, VALIDATION_REPORT_FILE])
    }

    pub fn transformed_train_key(&self) -> String {
        self.key(&[DATA_TRANSFORMATION_DIR, TRANSFORMED_DATA_DIR, TRAIN_FILE])
    }

    pub fn transformed_test_key(&self) -> String {
        self.key(&[DATA_TRANSFORMATION_DIR, TRANSFORMED_DATA_DIR, TEST_FILE])
    }

    pub fn transformer_key(&self) -> String {
        self.key(&[DATA_TRANSFORMATION_DIR, TRANSFORMED_OBJECT_DIR, PREPROCESSOR_FILE])
    }

    pub fn model_key(&self) -> String {
        self.key(&[MODEL_TRAINER_DIR, TRAINED_MODEL_DIR, MODEL_FILE])
    }

    pub fn summary_key(&self) -> String {
        self.key(&[RUN_SUMMARY_FILE])
    }
}

/// Static keys of the deployed slot.
pub struct DeployedLayout;

impl DeployedLayout {
    /// Pointer document naming the deployed release.
    pub fn manifest_key() -> String {
        join_key([DEPLOYED_DIR, MANIFEST_FILE])
    }

    pub fn release_model_key(run_id: &str) -> String {
        join_key([DEPLOYED_DIR, RELEASES_DIR, run_id, MODEL_FILE])
    }

    pub fn release_transformer_key(run_id: &str) -> String {
        join_key([DEPLOYED_DIR, RELEASES_DIR, run_id, PREPROCESSOR_FILE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap()
    }

    #[test]
    fn test_run_id_format() {
        let layout = RunLayout::from_timestamp(timestamp());
        assert_eq!(layout.run_id(), "03_09_2024_14_05_07");
    }

    #[test]
    fn test_stage_keys() {
        let layout = RunLayout::new("run");
        assert_eq!(layout.feature_store_key(), "run/data_ingestion/feature_store/data.csv");
        assert_eq!(layout.train_key(), "run/data_ingestion/ingested/train.csv");
        assert_eq!(layout.validation_report_key(), "run/data_validation/report.json");
        assert_eq!(
            layout.transformer_key(),
            "run/data_transformation/transformed_object/preprocessor.json"
        );
        assert_eq!(layout.model_key(), "run/model_trainer/trained_model/model.json");
        assert_eq!(layout.summary_key(), "run/run_summary.json");
    }

    #[test]
    fn test_deployed_keys() {
        assert_eq!(DeployedLayout::manifest_key(), "deployed/current.json");
        assert_eq!(
            DeployedLayout::release_model_key("r1"),
            "deployed/releases/r1/model.json"
        );
    }

    #[test]
    fn test_allocate_appends_suffix_when_taken() {
        let store = InMemoryStore::new();
        let first = RunLayout::allocate(&store, timestamp()).unwrap();
        store.put(&first.summary_key(), b"{}").unwrap();

        let second = RunLayout::allocate(&store, timestamp()).unwrap();
        assert_eq!(second.run_id(), "03_09_2024_14_05_07_1");
        store.put(&second.summary_key(), b"{}").unwrap();

        let third = RunLayout::allocate(&store, timestamp()).unwrap();
        assert_eq!(third.run_id(), "03_09_2024_14_05_07_2");
    }
}
