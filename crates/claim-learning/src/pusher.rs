//! Model pusher stage and the deployed manifest.
//!
//! A push copies the run's model and transformer into a release namespace
//! keyed by run id and only then replaces the manifest. The manifest write is
//! a single atomic `put`, so until it lands the previous manifest and the
//! pair it names stay authoritative.
//!
//! Superseded releases are kept. A reader that resolved the previous
//! manifest can still load its pair after a newer push, and rolling back is a
//! manifest rewrite. Removing old releases is left to whoever operates the
//! store.

use crate::error::PushError;
use crate::types::{DeployedManifest, EvaluationResult, TrainerArtifact};
use chrono::Utc;
use claim_processing::{
    ArtifactStore, ArtifactStoreExt, DeployedLayout, RunLayout, StoreError, TransformationArtifact,
};
use tracing::{info, warn};

/// Load the deployed manifest, or `None` when nothing was ever pushed.
pub fn load_manifest(store: &dyn ArtifactStore) -> Result<Option<DeployedManifest>, StoreError> {
    match store.load_json(&DeployedLayout::manifest_key()) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub struct ModelPusher<'a> {
    layout: &'a RunLayout,
    store: &'a dyn ArtifactStore,
}

impl<'a> ModelPusher<'a> {
    pub fn new(layout: &'a RunLayout, store: &'a dyn ArtifactStore) -> Self {
        Self { layout, store }
    }

    /// Publish the accepted candidate as the deployed release.
    pub fn push(
        &self,
        transformation: &TransformationArtifact,
        trained: &TrainerArtifact,
        evaluation: &EvaluationResult,
    ) -> Result<DeployedManifest, PushError> {
        if !evaluation.accepted {
            return Err(PushError::NotAccepted);
        }

        let run_id = self.layout.run_id();
        let model_key = DeployedLayout::release_model_key(run_id);
        let transformer_key = DeployedLayout::release_transformer_key(run_id);

        info!("Step 1: Copying release {} into the deployed namespace", run_id);
        let copied = self
            .store
            .copy(&trained.model_key, &model_key)
            .and_then(|()| self.store.copy(&transformation.transformer_key, &transformer_key));
        if let Err(e) = copied {
            self.discard_release(&[&model_key, &transformer_key]);
            return Err(e.into());
        }

        info!("Step 2: Switching manifest to {}", run_id);
        let manifest = DeployedManifest {
            run_id: run_id.to_string(),
            model_key,
            transformer_key,
            score: evaluation.new_score,
            pushed_at: Utc::now(),
        };
        if let Err(e) = self.store.save_json(&DeployedLayout::manifest_key(), &manifest) {
            self.discard_release(&[&manifest.model_key, &manifest.transformer_key]);
            return Err(e.into());
        }

        info!(
            "Deployed model from run {} (F1 {:.4}) to {}",
            run_id,
            manifest.score,
            self.store.describe()
        );
        Ok(manifest)
    }

    /// Best-effort removal of a release the manifest never pointed at.
    fn discard_release(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.store.delete(key) {
                warn!("Failed to remove partial release artifact {}: {}", key, e);
            }
        }
    }
}
