//! Model trainer stage.

use crate::error::TrainingError;
use crate::forest::{ClassificationMetrics, Classifier, RandomForest};
use crate::types::{ModelArtifact, TrainerArtifact};
use chrono::Utc;
use claim_processing::constants::FEATURE_COLUMNS;
use claim_processing::utils::read_feature_frame;
use claim_processing::{ArtifactStore, ArtifactStoreExt, PipelineConfig, RunLayout, TransformationArtifact};
use tracing::{debug, info, warn};

pub struct ModelTrainer<'a> {
    config: &'a PipelineConfig,
    layout: &'a RunLayout,
    store: &'a dyn ArtifactStore,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a PipelineConfig, layout: &'a RunLayout, store: &'a dyn ArtifactStore) -> Self {
        Self {
            config,
            layout,
            store,
        }
    }

    /// Fit the forest on the transformed training split and persist it.
    ///
    /// Fails without persisting anything when training accuracy is below
    /// `expected_accuracy`.
    pub fn train(&self, transformation: &TransformationArtifact) -> Result<TrainerArtifact, TrainingError> {
        info!("Step 1: Loading transformed training data");
        let frame = self.store.load_frame(&transformation.train_key)?;
        let (x, y) = read_feature_frame(&frame)?;
        debug!("Training matrix: {} rows x {} features", x.len(), FEATURE_COLUMNS.len());

        info!(
            "Step 2: Fitting random forest ({} trees, max depth {})",
            self.config.forest.n_estimators, self.config.forest.max_depth
        );
        let model = RandomForest::fit(&self.config.forest, &x, &y)?;

        let train_metrics = ClassificationMetrics::compute(&y, &model.predict(&x));
        info!(
            "Training metrics: accuracy {:.4}, precision {:.4}, recall {:.4}, f1 {:.4}",
            train_metrics.accuracy, train_metrics.precision, train_metrics.recall, train_metrics.f1_score
        );

        if train_metrics.accuracy < self.config.expected_accuracy {
            warn!(
                "Training accuracy {:.4} is below the expected {:.4}",
                train_metrics.accuracy, self.config.expected_accuracy
            );
            return Err(TrainingError::BelowExpectedAccuracy {
                accuracy: train_metrics.accuracy,
                expected: self.config.expected_accuracy,
            });
        }

        info!("Step 3: Saving model");
        let artifact = ModelArtifact {
            run_id: self.layout.run_id().to_string(),
            model,
            train_metrics,
            params: self.config.forest,
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            trained_at: Utc::now(),
        };
        let model_key = self.layout.model_key();
        self.store.save_json(&model_key, &artifact)?;
        info!("Model saved to {}", model_key);

        Ok(TrainerArtifact {
            model_key,
            train_metrics,
        })
    }
}
