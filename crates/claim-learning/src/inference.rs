//! Prediction against the deployed release.
//!
//! [`InferenceModel`] is an immutable snapshot of the manifest, transformer
//! and model taken at load time. A push that lands after loading does not
//! affect it; load again to pick up the new release.
//!
//! # Example
//!
//! ```rust,ignore
//! use claim_learning::{InferenceModel, Record};
//!
//! let model = InferenceModel::load(&store)?;
//! let label = model.predict(&record)?;
//! println!("{}", if label == 1 { "APPROVED" } else { "REJECTED" });
//! ```

use crate::error::InferenceError;
use crate::forest::{Classifier, RandomForest};
use crate::pusher::load_manifest;
use crate::types::{DeployedManifest, ModelArtifact, Prediction};
use claim_processing::constants::FEATURE_COUNT;
use claim_processing::{ArtifactStore, ArtifactStoreExt, DeployedLayout, FeatureTransformer, Record, StoreError};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

fn load_deployed<T: DeserializeOwned>(store: &dyn ArtifactStore, key: &str) -> Result<T, InferenceError> {
    store.load_json(key).map_err(|e| match e {
        StoreError::NotFound { .. } | StoreError::Serialization { .. } => InferenceError::Corrupt {
            key: key.to_string(),
            source: e,
        },
        other => InferenceError::Store(other),
    })
}

/// Deployed transformer and model, ready to score records.
#[derive(Debug, Clone)]
pub struct InferenceModel {
    manifest: DeployedManifest,
    transformer: FeatureTransformer,
    model: RandomForest,
}

static_assertions::assert_impl_all!(InferenceModel: Send, Sync);

impl InferenceModel {
    /// Resolve the manifest and load the pair it names.
    pub fn load(store: &dyn ArtifactStore) -> Result<Self, InferenceError> {
        let manifest_key = DeployedLayout::manifest_key();
        let manifest = load_manifest(store)
            .map_err(|e| match e {
                StoreError::Serialization { .. } => InferenceError::Corrupt {
                    key: manifest_key.clone(),
                    source: e,
                },
                other => InferenceError::Store(other),
            })?
            .ok_or_else(|| InferenceError::NoDeployedModel {
                manifest_key: manifest_key.clone(),
            })?;

        let transformer: FeatureTransformer = load_deployed(store, &manifest.transformer_key)?;
        transformer
            .check_layout()
            .map_err(|source| InferenceError::IncompatibleTransformer {
                key: manifest.transformer_key.clone(),
                source,
            })?;

        let artifact: ModelArtifact = load_deployed(store, &manifest.model_key)?;
        let model = artifact.model;
        if !model.is_well_formed() || model.n_features() != FEATURE_COUNT {
            return Err(InferenceError::IncompatibleModel {
                key: manifest.model_key.clone(),
                reason: format!(
                    "model expects {} features, records have {}",
                    model.n_features(),
                    FEATURE_COUNT
                ),
            });
        }

        info!("Loaded deployed model from run {}", manifest.run_id);
        Ok(Self {
            manifest,
            transformer,
            model,
        })
    }

    pub fn manifest(&self) -> &DeployedManifest {
        &self.manifest
    }

    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    /// Label for one record: 1 when the claim is likely approved.
    pub fn predict(&self, record: &Record) -> Result<u8, InferenceError> {
        Ok(self.predict_detailed(record)?.label)
    }

    /// Label plus forest probability for one record.
    pub fn predict_detailed(&self, record: &Record) -> Result<Prediction, InferenceError> {
        record.validate()?;
        let features = self.transformer.transform_record(record);
        let probability = self.model.predict_proba_row(&features);
        let label = self.model.predict_row(&features);
        debug!("Predicted {} (p = {:.4})", label, probability);
        Ok(Prediction {
            label,
            probability,
            approved: label == 1,
            run_id: self.manifest.run_id.clone(),
        })
    }

    /// Labels for many records. Any invalid record fails the whole batch.
    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<u8>, InferenceError> {
        for record in records {
            record.validate()?;
        }
        let rows: Vec<Vec<f64>> = records
            .iter()
            .map(|record| self.transformer.transform_record(record))
            .collect();
        Ok(self.model.predict(&rows))
    }
}

/// Validates records, then loads the deployed release and predicts.
///
/// Each call takes a fresh snapshot, so it always serves the release that
/// was current when the call started.
#[derive(Clone)]
pub struct InferencePipeline {
    store: Arc<dyn ArtifactStore>,
}

static_assertions::assert_impl_all!(InferencePipeline: Send, Sync);

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline")
            .field("store", &self.store.describe())
            .finish()
    }
}

impl InferencePipeline {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn load_model(&self) -> Result<InferenceModel, InferenceError> {
        InferenceModel::load(self.store.as_ref())
    }

    /// Validate `record` before touching any artifact, then predict.
    pub fn predict(&self, record: &Record) -> Result<u8, InferenceError> {
        record.validate()?;
        self.load_model()?.predict(record)
    }

    pub fn predict_detailed(&self, record: &Record) -> Result<Prediction, InferenceError> {
        record.validate()?;
        self.load_model()?.predict_detailed(record)
    }

    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<u8>, InferenceError> {
        for record in records {
            record.validate()?;
        }
        self.load_model()?.predict_batch(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_processing::{InMemoryStore, RecordError};

    fn record(age: u32) -> Record {
        Record {
            gender: 1,
            age,
            driving_license: 1,
            region_code: 28,
            previously_insured: 0,
            annual_premium: 30000.0,
            policy_sales_channel: 152,
            vintage: 150,
            vehicle_age_lt_1_year: 0,
            vehicle_age_gt_2_years: 0,
            vehicle_damage_yes: 1,
        }
    }

    #[test]
    fn test_no_deployed_model() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        let err = InferencePipeline::new(store).predict(&record(30)).unwrap_err();
        assert!(matches!(err, InferenceError::NoDeployedModel { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_record_rejected_before_loading() {
        // Nothing is deployed, so reaching the store would give NoDeployedModel.
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        let pipeline = InferencePipeline::new(store);
        let err = pipeline.predict(&record(17)).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::InvalidRecord(RecordError::OutOfRange { .. })
        ));

        let err = pipeline.predict_batch(&[record(30), record(101)]).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_corrupt_manifest() {
        let store = InMemoryStore::new();
        store.put(&DeployedLayout::manifest_key(), b"{").unwrap();
        let err = InferenceModel::load(&store).unwrap_err();
        assert_eq!(err.error_code(), "CORRUPT_ARTIFACT");
        let cause = std::error::Error::source(&err).unwrap();
        assert!(matches!(
            cause.downcast_ref::<StoreError>(),
            Some(StoreError::Serialization { .. })
        ));
    }

    #[test]
    fn test_manifest_pointing_at_missing_release() {
        let store = InMemoryStore::new();
        let manifest = DeployedManifest {
            run_id: "gone".into(),
            model_key: DeployedLayout::release_model_key("gone"),
            transformer_key: DeployedLayout::release_transformer_key("gone"),
            score: 0.5,
            pushed_at: chrono::Utc::now(),
        };
        store.save_json(&DeployedLayout::manifest_key(), &manifest).unwrap();

        let err = InferenceModel::load(&store).unwrap_err();
        assert!(matches!(
            &err,
            InferenceError::Corrupt { key, source: StoreError::NotFound { .. } } if *key == manifest.transformer_key
        ));
    }
}
