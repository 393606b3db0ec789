//! Model evaluation stage: candidate versus deployed model.
//!
//! Both models are scored on the same raw test split, each through its own
//! transformer. The deployed model therefore sees exactly the features it was
//! trained on even when this run fitted different scaling parameters.

use crate::error::EvaluationError;
use crate::forest::{ClassificationMetrics, Classifier};
use crate::pusher::load_manifest;
use crate::types::{EvaluationResult, ModelArtifact, TrainerArtifact};
use claim_processing::{
    ArtifactStore, ArtifactStoreExt, EncodedData, FeatureTransformer, IngestionArtifact, PipelineConfig,
    StoreError, TransformationArtifact, encode_frame,
};
use tracing::{debug, info, warn};

/// Accept when there is no deployed model, or when the candidate beats it by
/// at least `threshold`.
pub fn is_improvement(new_score: f64, current_score: Option<f64>, threshold: f64) -> bool {
    match current_score {
        None => true,
        Some(current) => new_score - current >= threshold,
    }
}

/// Score a model through its own transformer on encoded raw rows.
pub fn score(transformer: &FeatureTransformer, model: &dyn Classifier, data: &EncodedData) -> ClassificationMetrics {
    let rows = transformer.transform_rows(&data.rows);
    ClassificationMetrics::compute(&data.labels, &model.predict(&rows))
}

pub struct ModelEvaluation<'a> {
    config: &'a PipelineConfig,
    store: &'a dyn ArtifactStore,
}

impl<'a> ModelEvaluation<'a> {
    pub fn new(config: &'a PipelineConfig, store: &'a dyn ArtifactStore) -> Self {
        Self { config, store }
    }

    fn load_pair(
        &self,
        which: &'static str,
        transformer_key: &str,
        model_key: &str,
    ) -> Result<(FeatureTransformer, ModelArtifact), EvaluationError> {
        let unavailable = |source: StoreError| EvaluationError::ModelUnavailable { which, source };
        let transformer: FeatureTransformer = self.store.load_json(transformer_key).map_err(unavailable)?;
        transformer.check_layout()?;
        let model: ModelArtifact = self.store.load_json(model_key).map_err(unavailable)?;
        Ok((transformer, model))
    }

    pub fn evaluate(
        &self,
        ingestion: &IngestionArtifact,
        transformation: &TransformationArtifact,
        trained: &TrainerArtifact,
    ) -> Result<EvaluationResult, EvaluationError> {
        info!("Step 1: Loading raw test split");
        let test = encode_frame(&self.store.load_frame(&ingestion.test_key)?)?;
        if test.is_empty() {
            return Err(EvaluationError::EmptyTestSet);
        }
        debug!("Scoring on {} test rows", test.len());

        info!("Step 2: Scoring candidate model");
        let (transformer, candidate) =
            self.load_pair("candidate", &transformation.transformer_key, &trained.model_key)?;
        let new_metrics = score(&transformer, &candidate.model, &test);
        let new_score = new_metrics.f1_score;
        info!(
            "Candidate F1 {:.4} (accuracy {:.4})",
            new_score, new_metrics.accuracy
        );

        info!("Step 3: Scoring deployed model");
        let manifest = load_manifest(self.store)?;
        let (current_score, incumbent_run_id) = match &manifest {
            None => {
                info!("No deployed model found, accepting candidate");
                (None, None)
            }
            Some(manifest) => {
                let (transformer, incumbent) =
                    self.load_pair("deployed", &manifest.transformer_key, &manifest.model_key)?;
                let metrics = score(&transformer, &incumbent.model, &test);
                info!("Deployed model from run {} scores F1 {:.4}", manifest.run_id, metrics.f1_score);
                (Some(metrics.f1_score), Some(manifest.run_id.clone()))
            }
        };

        let threshold = self.config.min_improvement;
        let accepted = is_improvement(new_score, current_score, threshold);
        let improvement = new_score - current_score.unwrap_or(0.0);
        if accepted {
            info!("Candidate accepted (improvement {:+.4})", improvement);
        } else {
            warn!(
                "Candidate rejected: improvement {:+.4} is below the required {:.4}",
                improvement, threshold
            );
        }

        Ok(EvaluationResult {
            accepted,
            new_score,
            current_score,
            improvement,
            threshold,
            incumbent_run_id,
            new_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::RandomForest;
    use crate::types::DeployedManifest;
    use chrono::Utc;
    use claim_processing::constants::{FEATURE_COLUMNS, PREVIOUSLY_INSURED, TARGET_COLUMN, VEHICLE_DAMAGE_YES, feature_index};
    use claim_processing::{DeployedLayout, ForestParams, InMemoryStore, RunLayout, SyntheticClaims};
    use polars::prelude::{Column, DataType};

    fn forest_params() -> ForestParams {
        ForestParams {
            n_estimators: 8,
            max_depth: 6,
            ..ForestParams::default()
        }
    }

    fn ingestion_with_test(store: &InMemoryStore, test: &mut polars::prelude::DataFrame) -> IngestionArtifact {
        let layout = RunLayout::new("candidate");
        store.save_frame(&layout.test_key(), test).unwrap();
        IngestionArtifact {
            feature_store_key: layout.feature_store_key(),
            train_key: layout.train_key(),
            test_key: layout.test_key(),
            rows: test.height(),
            train_rows: 0,
            test_rows: test.height(),
        }
    }

    /// Fit a forest through `transformer` and store the pair under the given keys.
    fn save_pair(
        store: &InMemoryStore,
        transformer: &FeatureTransformer,
        train: &EncodedData,
        transformer_key: &str,
        model_key: &str,
    ) {
        let model = RandomForest::fit(&forest_params(), &transformer.transform_rows(&train.rows), &train.labels).unwrap();
        let artifact = ModelArtifact {
            run_id: model_key.to_string(),
            model,
            train_metrics: ClassificationMetrics::default(),
            params: forest_params(),
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            trained_at: Utc::now(),
        };
        store.save_json(transformer_key, transformer).unwrap();
        store.save_json(model_key, &artifact).unwrap();
    }

    /// Same transformer, but the two indicators that drive the label land far from 0/1.
    fn with_shifted_indicators(transformer: &FeatureTransformer) -> FeatureTransformer {
        let mut json = serde_json::to_value(transformer).unwrap();
        for column in [PREVIOUSLY_INSURED, VEHICLE_DAMAGE_YES] {
            let index = feature_index(column).unwrap();
            json["features"][index]["scaling"] = serde_json::json!({"kind": "standard", "mean": 10.0, "std": 1.0});
        }
        serde_json::from_value(json).unwrap()
    }

    fn deploy(store: &InMemoryStore, run_id: &str) -> DeployedManifest {
        let manifest = DeployedManifest {
            run_id: run_id.to_string(),
            model_key: DeployedLayout::release_model_key(run_id),
            transformer_key: DeployedLayout::release_transformer_key(run_id),
            score: 0.5,
            pushed_at: Utc::now(),
        };
        store.save_json(&DeployedLayout::manifest_key(), &manifest).unwrap();
        manifest
    }

    fn candidate_artifacts(layout: &RunLayout) -> (TransformationArtifact, TrainerArtifact) {
        let transformation = TransformationArtifact {
            transformer_key: layout.transformer_key(),
            train_key: layout.transformed_train_key(),
            test_key: layout.transformed_test_key(),
            train_rows: 0,
            test_rows: 0,
            dropped_rows: 0,
            processing_steps: Vec::new(),
        };
        let trained = TrainerArtifact {
            model_key: layout.model_key(),
            train_metrics: ClassificationMetrics::default(),
        };
        (transformation, trained)
    }

    #[test]
    fn test_incumbent_scored_through_its_own_transformer() {
        let store = InMemoryStore::new();
        let config = PipelineConfig::default();
        let train = encode_frame(&SyntheticClaims::new(400, 11).generate().unwrap()).unwrap();
        let mut test_frame = SyntheticClaims::new(200, 12).generate().unwrap();
        let ingestion = ingestion_with_test(&store, &mut test_frame);

        let layout = RunLayout::new("candidate");
        let candidate_transformer = FeatureTransformer::fit(&train.rows, &mut Vec::new()).unwrap();
        save_pair(&store, &candidate_transformer, &train, &layout.transformer_key(), &layout.model_key());

        let incumbent_transformer = with_shifted_indicators(&candidate_transformer);
        let manifest = deploy(&store, "incumbent");
        save_pair(&store, &incumbent_transformer, &train, &manifest.transformer_key, &manifest.model_key);

        let (transformation, trained) = candidate_artifacts(&layout);
        let result = ModelEvaluation::new(&config, &store)
            .evaluate(&ingestion, &transformation, &trained)
            .unwrap();

        // Expected scores from the stored artifacts on the stored raw split.
        let test = encode_frame(&store.load_frame(&ingestion.test_key).unwrap()).unwrap();
        let own: FeatureTransformer = store.load_json(&manifest.transformer_key).unwrap();
        let incumbent: ModelArtifact = store.load_json(&manifest.model_key).unwrap();
        let candidate_own: FeatureTransformer = store.load_json(&layout.transformer_key()).unwrap();
        let candidate: ModelArtifact = store.load_json(&layout.model_key()).unwrap();

        let expected = score(&own, &incumbent.model, &test).f1_score;
        let through_candidate_transformer = score(&candidate_own, &incumbent.model, &test).f1_score;
        assert!(expected > 0.8, "incumbent F1 {expected}");
        assert!(
            (expected - through_candidate_transformer).abs() > 0.3,
            "shifted scaling should matter: {expected} vs {through_candidate_transformer}"
        );

        assert_eq!(result.current_score, Some(expected));
        assert_eq!(result.incumbent_run_id.as_deref(), Some("incumbent"));
        assert_eq!(result.new_score, score(&candidate_own, &candidate.model, &test).f1_score);
        assert_eq!(result.improvement, result.new_score - expected);
    }

    #[test]
    fn test_cold_start_evaluation() {
        let store = InMemoryStore::new();
        let config = PipelineConfig::default();
        let train = encode_frame(&SyntheticClaims::new(300, 5).generate().unwrap()).unwrap();
        let mut test_frame = SyntheticClaims::new(100, 6).generate().unwrap();
        let ingestion = ingestion_with_test(&store, &mut test_frame);

        let layout = RunLayout::new("candidate");
        let transformer = FeatureTransformer::fit(&train.rows, &mut Vec::new()).unwrap();
        save_pair(&store, &transformer, &train, &layout.transformer_key(), &layout.model_key());

        let (transformation, trained) = candidate_artifacts(&layout);
        let result = ModelEvaluation::new(&config, &store)
            .evaluate(&ingestion, &transformation, &trained)
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.current_score, None);
        assert_eq!(result.incumbent_run_id, None);
    }

    #[test]
    fn test_unlabelled_test_split_is_empty() {
        let store = InMemoryStore::new();
        let config = PipelineConfig::default();
        let mut test_frame = SyntheticClaims::new(20, 1).generate().unwrap();
        test_frame
            .with_column(Column::full_null(TARGET_COLUMN.into(), 20, &DataType::Int64))
            .unwrap();
        let ingestion = ingestion_with_test(&store, &mut test_frame);

        let (transformation, trained) = candidate_artifacts(&RunLayout::new("candidate"));
        let err = ModelEvaluation::new(&config, &store)
            .evaluate(&ingestion, &transformation, &trained)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::EmptyTestSet));
        assert_eq!(err.error_code(), "EMPTY_TEST_SET");
    }

    #[test]
    fn test_deployed_release_missing() {
        let store = InMemoryStore::new();
        let config = PipelineConfig::default();
        let train = encode_frame(&SyntheticClaims::new(200, 2).generate().unwrap()).unwrap();
        let mut test_frame = SyntheticClaims::new(50, 3).generate().unwrap();
        let ingestion = ingestion_with_test(&store, &mut test_frame);

        let layout = RunLayout::new("candidate");
        let transformer = FeatureTransformer::fit(&train.rows, &mut Vec::new()).unwrap();
        save_pair(&store, &transformer, &train, &layout.transformer_key(), &layout.model_key());
        deploy(&store, "vanished");

        let (transformation, trained) = candidate_artifacts(&layout);
        let err = ModelEvaluation::new(&config, &store)
            .evaluate(&ingestion, &transformation, &trained)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::ModelUnavailable { which: "deployed", .. }));
    }

    #[test]
    fn test_cold_start_always_accepts() {
        assert!(is_improvement(0.0, None, 0.02));
        assert!(is_improvement(0.0, None, 10.0));
    }

    #[test]
    fn test_improvement_threshold() {
        assert!(is_improvement(0.75, Some(0.70), 0.02));
        assert!(!is_improvement(0.71, Some(0.70), 0.02));
        assert!(!is_improvement(0.60, Some(0.70), 0.02));
        assert!(is_improvement(0.70, Some(0.70), 0.0));
    }

    #[test]
    fn test_acceptance_is_monotonic() {
        let current = Some(0.5);
        let threshold = 0.02;
        let mut seen_accept = false;
        for step in 0..=100 {
            let new_score = step as f64 / 100.0;
            let accepted = is_improvement(new_score, current, threshold);
            // Once accepted, every higher score is accepted too.
            assert!(!seen_accept || accepted, "score {new_score}");
            seen_accept |= accepted;
        }
        assert!(seen_accept);
    }
}
