//! Artifacts and results produced by the model-side stages.
//!
//! # Overview
//!
//! - [`ModelArtifact`]: the persisted classifier with its metadata
//! - [`TrainerArtifact`]: where the trainer put the model and how it scored
//! - [`EvaluationResult`]: candidate versus deployed comparison
//! - [`DeployedManifest`]: pointer document naming the deployed release
//! - [`RunSummary`]: record of one orchestrated run
//! - [`Prediction`]: result of a single inference

use crate::forest::{ClassificationMetrics, RandomForest};
use chrono::{DateTime, Utc};
use claim_processing::{ForestParams, IngestionArtifact, TransformationArtifact, ValidationReport};
use serde::{Deserialize, Serialize};

/// Fitted classifier plus everything needed to audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Run that produced the model.
    pub run_id: String,
    pub model: RandomForest,
    /// Metrics on the training split.
    pub train_metrics: ClassificationMetrics,
    pub params: ForestParams,
    /// Feature columns in the order the model expects.
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

/// Output of the trainer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerArtifact {
    pub model_key: String,
    pub train_metrics: ClassificationMetrics,
}

/// Output of the evaluation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accepted: bool,
    /// F1 of the candidate on the held-out test split.
    pub new_score: f64,
    /// F1 of the deployed model on the same split; `None` on cold start.
    pub current_score: Option<f64>,
    /// `new_score - current_score`, or `new_score` on cold start.
    pub improvement: f64,
    /// Minimum improvement that was required.
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incumbent_run_id: Option<String>,
    pub new_metrics: ClassificationMetrics,
}

/// The deployed release, stored at a static key.
///
/// Readers resolve this document first and then load exactly the pair it
/// names, so a reader never mixes a model with another run's transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedManifest {
    pub run_id: String,
    pub model_key: String,
    pub transformer_key: String,
    /// F1 the model scored when it was accepted.
    pub score: f64,
    pub pushed_at: DateTime<Utc>,
}

/// How an orchestrated run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The candidate was accepted and pushed.
    Deployed,
    /// Evaluation kept the deployed model.
    Rejected,
    /// The validation report was invalid; later stages did not run.
    ValidationFailed,
}

impl RunOutcome {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Rejected => "rejected",
            Self::ValidationFailed => "validation failed",
        }
    }
}

/// Record of one training run, persisted as the run's summary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RunSummary {
    pub run_id: String,
    /// `None` when the run failed with an error.
    pub outcome: Option<RunOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion: Option<IngestionArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainerArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeployedManifest>,
    /// `{code, stage, message}` of the failure, when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl RunSummary {
    pub(crate) fn started(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            outcome: None,
            started_at,
            finished_at: started_at,
            duration_seconds: 0.0,
            ingestion: None,
            validation: None,
            transformation: None,
            training: None,
            evaluation: None,
            deployment: None,
            error: None,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Utc::now();
        self.duration_seconds =
            (self.finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
    }

    pub fn is_deployed(&self) -> bool {
        self.outcome == Some(RunOutcome::Deployed)
    }
}

/// Result of a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when the claim is likely approved.
    pub label: u8,
    /// Mean positive-class probability across the forest.
    pub probability: f64,
    pub approved: bool,
    /// Run whose model produced the prediction.
    pub run_id: String,
}
