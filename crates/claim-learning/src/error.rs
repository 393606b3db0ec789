//! Error types for the model-side stages and the orchestrator.
//!
//! Each stage has its own enum. [`PipelineError`] wraps whichever stage
//! failed, so callers can tell which stage broke and still reach the
//! original cause through [`std::error::Error::source`].

use claim_processing::{
    ConfigValidationError, IngestionError, RecordError, StoreError, TransformationError,
    ValidationError,
};
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Failures of the model trainer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrainingError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Feature rows ({rows}) and labels ({labels}) differ in length")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("Row {row} has {actual} features, expected {expected}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Label {0} is not binary")]
    InvalidLabel(u8),

    /// Hard gate: the fitted model is not good enough on its own training data.
    #[error("Training accuracy {accuracy:.4} is below the expected {expected:.4}")]
    BelowExpectedAccuracy { accuracy: f64, expected: f64 },

    #[error("Transformed training data is unusable: {0}")]
    Data(#[from] TransformationError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),
}

impl TrainingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTrainingSet => "EMPTY_TRAINING_SET",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::InconsistentWidth { .. } => "INCONSISTENT_WIDTH",
            Self::InvalidLabel(_) => "INVALID_LABEL",
            Self::BelowExpectedAccuracy { .. } => "BELOW_EXPECTED_ACCURACY",
            Self::Data(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }
}

/// Failures of model evaluation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("Test split has no labelled rows")]
    EmptyTestSet,

    #[error("Failed to load {which} model: {source}")]
    ModelUnavailable {
        which: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Test data is unusable: {0}")]
    Data(#[from] TransformationError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),
}

impl EvaluationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTestSet => "EMPTY_TEST_SET",
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::Data(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }
}

/// Failures of the model pusher.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PushError {
    /// Evaluation rejected the candidate; nothing was pushed.
    #[error("Candidate model was not accepted by evaluation")]
    NotAccepted,

    #[error("Failed to publish release: {0}")]
    Store(#[from] StoreError),
}

impl PushError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAccepted => "NOT_ACCEPTED",
            Self::Store(e) => e.error_code(),
        }
    }
}

/// Failures of the inference path.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum InferenceError {
    /// No model was ever pushed.
    #[error("No deployed model found at '{manifest_key}'")]
    NoDeployedModel { manifest_key: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// A deployed artifact is missing or cannot be decoded.
    #[error("Deployed artifact '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The deployed transformer does not produce the eleven-feature layout.
    #[error("Deployed transformer '{key}' is incompatible: {source}")]
    IncompatibleTransformer {
        key: String,
        #[source]
        source: TransformationError,
    },

    /// The deployed model cannot score eleven-feature rows.
    #[error("Deployed model '{key}' is unusable: {reason}")]
    IncompatibleModel { key: String, reason: String },

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),
}

impl InferenceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoDeployedModel { .. } => "NO_DEPLOYED_MODEL",
            Self::InvalidRecord(_) => "INVALID_RECORD",
            Self::Corrupt { .. } => "CORRUPT_ARTIFACT",
            Self::IncompatibleTransformer { .. } | Self::IncompatibleModel { .. } => "INCOMPATIBLE_ARTIFACT",
            Self::Store(e) => e.error_code(),
        }
    }

    /// Check if the caller can fix the error by changing the input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidRecord(_))
    }
}

/// A training run failed in one of its stages.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("No record source configured")]
    MissingSource,

    #[error("Run bookkeeping failed: {0}")]
    Store(#[from] StoreError),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transformation failed: {0}")]
    Transformation(#[from] TransformationError),

    #[error("Training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Push failed: {0}")]
    Push(#[from] PushError),
}

impl PipelineError {
    /// Code of the underlying stage error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::MissingSource => "MISSING_SOURCE",
            Self::Store(e) => e.error_code(),
            Self::Ingestion(e) => e.error_code(),
            Self::Validation(e) => e.error_code(),
            Self::Transformation(e) => e.error_code(),
            Self::Training(e) => e.error_code(),
            Self::Evaluation(e) => e.error_code(),
            Self::Push(e) => e.error_code(),
        }
    }

    /// Name of the stage the error came from.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::MissingSource => "setup",
            Self::Store(_) => "bookkeeping",
            Self::Ingestion(_) => "ingestion",
            Self::Validation(_) => "validation",
            Self::Transformation(_) => "transformation",
            Self::Training(_) => "training",
            Self::Evaluation(_) => "evaluation",
            Self::Push(_) => "push",
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("stage", &self.stage())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl Serialize for InferenceError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("InferenceError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_pipeline_error_keeps_stage_code() {
        let err = PipelineError::from(TrainingError::BelowExpectedAccuracy {
            accuracy: 0.5,
            expected: 0.6,
        });
        assert_eq!(err.error_code(), "BELOW_EXPECTED_ACCURACY");
        assert_eq!(err.stage(), "training");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("0.5000"));
    }

    #[test]
    fn test_nested_store_error_code() {
        let err = PipelineError::from(IngestionError::from(StoreError::NotFound {
            key: "k".into(),
        }));
        assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");
        assert_eq!(err.stage(), "ingestion");
    }

    #[test]
    fn test_pipeline_error_serialization() {
        let err = PipelineError::from(PushError::NotAccepted);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("NOT_ACCEPTED"));
        assert!(json.contains("\"stage\":\"push\""));
    }

    #[test]
    fn test_inference_error_recoverable() {
        let invalid = InferenceError::from(RecordError::ConflictingVehicleAge);
        assert!(invalid.is_recoverable());
        let missing = InferenceError::NoDeployedModel {
            manifest_key: "deployed/current.json".into(),
        };
        assert!(!missing.is_recoverable());
        assert_eq!(missing.error_code(), "NO_DEPLOYED_MODEL");
    }
}
