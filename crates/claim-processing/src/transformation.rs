//! Data transformation stage: fit the transformer on train, apply to both splits.

use crate::encoding::encode_frame;
use crate::error::TransformationError;
use crate::layout::RunLayout;
use crate::store::{ArtifactStore, ArtifactStoreExt};
use crate::transformer::FeatureTransformer;
use crate::types::{IngestionArtifact, TransformationArtifact, ValidationReport};
use crate::utils::feature_frame;
use tracing::{debug, info};

pub struct DataTransformation<'a> {
    layout: &'a RunLayout,
    store: &'a dyn ArtifactStore,
}

impl<'a> DataTransformation<'a> {
    pub fn new(layout: &'a RunLayout, store: &'a dyn ArtifactStore) -> Self {
        Self { layout, store }
    }

    /// Encode, fit on the training split only, transform both splits and
    /// persist the transformer and transformed frames.
    pub fn transform(
        &self,
        ingestion: &IngestionArtifact,
        report: &ValidationReport,
    ) -> Result<TransformationArtifact, TransformationError> {
        if !report.is_valid {
            return Err(TransformationError::ValidationFailed(report.message.clone()));
        }

        info!("Step 1: Encoding raw splits");
        let train = encode_frame(&self.store.load_frame(&ingestion.train_key)?)?;
        let test = encode_frame(&self.store.load_frame(&ingestion.test_key)?)?;
        if train.is_empty() {
            return Err(TransformationError::EmptyTrainingSplit);
        }
        let mut processing_steps = Vec::new();
        let dropped_rows = train.dropped_rows + test.dropped_rows;
        if dropped_rows > 0 {
            processing_steps.push(format!("Dropped {} rows with missing label", dropped_rows));
        }

        info!("Step 2: Fitting transformer on {} training rows", train.len());
        let transformer = FeatureTransformer::fit(&train.rows, &mut processing_steps)?;
        for step in &processing_steps {
            debug!("{}", step);
        }

        info!("Step 3: Transforming train and test splits");
        let train_rows = transformer.transform_rows(&train.rows);
        let test_rows = transformer.transform_rows(&test.rows);
        let mut train_frame = feature_frame(&train_rows, &train.labels)?;
        let mut test_frame = feature_frame(&test_rows, &test.labels)?;

        let transformer_key = self.layout.transformer_key();
        let train_key = self.layout.transformed_train_key();
        let test_key = self.layout.transformed_test_key();
        self.store.save_json(&transformer_key, &transformer)?;
        self.store.save_frame(&train_key, &mut train_frame)?;
        self.store.save_frame(&test_key, &mut test_frame)?;
        info!("Transformer saved to {}", transformer_key);

        Ok(TransformationArtifact {
            transformer_key,
            train_key,
            test_key,
            train_rows: train.len(),
            test_rows: test.len(),
            dropped_rows,
            processing_steps,
        })
    }
}
