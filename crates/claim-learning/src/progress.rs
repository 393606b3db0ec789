//! Progress reporting for the training pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use claim_learning::TrainingPipeline;
//!
//! let summary = TrainingPipeline::builder()
//!     .config(config)
//!     .source(source)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//! ```

use serde::{Deserialize, Serialize};

/// States of a training run.
///
/// A run moves forward through the stages in declaration order and ends in
/// either [`Done`](Self::Done) or [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading the source and splitting train/test
    Ingesting,
    /// Schema and drift checks
    Validating,
    /// Encoding, imputation and scaling
    Transforming,
    /// Fitting the classifier
    Training,
    /// Comparing against the deployed model
    Evaluating,
    /// Publishing the accepted model
    Pushing,
    /// Run finished (deployed, rejected or halted by validation)
    Done,
    /// Run stopped on an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ingesting => "Ingesting Data",
            Self::Validating => "Validating Data",
            Self::Transforming => "Transforming Data",
            Self::Training => "Training Model",
            Self::Evaluating => "Evaluating Model",
            Self::Pushing => "Pushing Model",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Returns the typical weight of this stage in the overall run (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Ingesting => 0.10,
            Self::Validating => 0.10,
            Self::Transforming => 0.15,
            Self::Training => 0.45,
            Self::Evaluating => 0.15,
            Self::Pushing => 0.05,
            Self::Done | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Ingesting => 0.0,
            Self::Validating => 0.10,
            Self::Transforming => 0.20,
            Self::Training => 0.35,
            Self::Evaluating => 0.80,
            Self::Pushing => 0.95,
            Self::Done => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A progress update emitted at stage boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Done,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync` so a pipeline holding one can be
/// run from a background thread.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WORKING_STAGES: [PipelineStage; 6] = [
        PipelineStage::Ingesting,
        PipelineStage::Validating,
        PipelineStage::Transforming,
        PipelineStage::Training,
        PipelineStage::Evaluating,
        PipelineStage::Pushing,
    ];

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Training, 0.5, "Fitting");
        assert_eq!(update.stage, PipelineStage::Training);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - (0.35 + 0.45 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_stage_weights_sum() {
        let total: f32 = WORKING_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        let mut expected = 0.0f32;
        for stage in WORKING_STAGES {
            assert!((stage.base_progress() - expected).abs() < 1e-6, "{stage:?}");
            expected += stage.weight();
        }
    }

    #[test]
    fn test_terminal_updates() {
        assert_eq!(ProgressUpdate::complete("ok").progress, 1.0);
        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, PipelineStage::Failed);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_closure_reporter_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(PipelineStage::Ingesting, 0.0, "start"));
        })
        .join()
        .unwrap();
        reporter.report(ProgressUpdate::complete("done"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        assert_eq!(
            serde_json::to_string(&PipelineStage::Transforming).unwrap(),
            "\"transforming\""
        );
        assert_eq!(serde_json::to_string(&PipelineStage::Done).unwrap(), "\"done\"");
    }
}
