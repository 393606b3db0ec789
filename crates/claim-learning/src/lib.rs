//! claim-learning: model side of the vehicle-insurance claim approval pipeline.
//!
//! Builds on the data stages of `claim_processing` and adds:
//!
//! - **Trainer**: a seeded random forest fit on the transformed training split,
//!   gated on training accuracy
//! - **Evaluation**: F1 of the candidate against the deployed model, each scored
//!   through its own transformer on the same raw test split
//! - **Pusher**: release copy plus an atomic manifest swap
//! - **Orchestrator**: [`TrainingPipeline`] runs every stage in order with
//!   progress reporting and a persisted run summary
//! - **Inference**: [`InferenceModel`] / [`InferencePipeline`] score records
//!   against the deployed release
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use claim_learning::{InferencePipeline, TrainingPipeline};
//! use claim_processing::{CsvSource, FileSystemStore, PipelineConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileSystemStore::new("artifacts"));
//! let summary = TrainingPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .store(store.clone())
//!     .source(Arc::new(CsvSource::new("claims.csv")))
//!     .build()?
//!     .run()?;
//!
//! let label = InferencePipeline::new(store).predict(&record)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! RecordSource ─► ingest ─► validate ─► transform ─► train ─► evaluate ─► push
//!                    │          │           │          │                  │
//!                    └──────────┴─── ArtifactStore ────┴──────────────────┘
//!                                           │
//!                          deployed/current.json ─► InferenceModel
//! ```

pub mod error;
pub mod evaluation;
pub mod forest;
pub mod inference;
pub mod pipeline;
pub mod progress;
pub mod pusher;
pub mod trainer;
pub mod types;

// Error types
pub use error::{EvaluationError, InferenceError, PipelineError, PushError, TrainingError};
// Stages
pub use evaluation::{ModelEvaluation, is_improvement};
pub use inference::{InferenceModel, InferencePipeline};
pub use pipeline::{TrainingPipeline, TrainingPipelineBuilder};
pub use pusher::{ModelPusher, load_manifest};
pub use trainer::ModelTrainer;
// Classifier
pub use forest::{ClassificationMetrics, Classifier, RandomForest};
// Progress reporting types
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
// Result types
pub use types::{
    DeployedManifest, EvaluationResult, ModelArtifact, Prediction, RunOutcome, RunSummary, TrainerArtifact,
};

// Re-exported so callers can configure and predict without naming the data crate.
pub use claim_processing::{ApplicantForm, Gender, PipelineConfig, Record, VehicleAge};
