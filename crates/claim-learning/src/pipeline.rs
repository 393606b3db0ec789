//! Training pipeline orchestrator.
//!
//! Runs ingestion, validation, transformation, training, evaluation and push
//! in order. Each stage starts only after the previous one succeeded.
//!
//! - An invalid validation report halts the run without an error
//!   ([`RunOutcome::ValidationFailed`]).
//! - A rejected candidate ends the run without a push ([`RunOutcome::Rejected`]).
//! - Any stage error stops the run and is returned as [`PipelineError`].
//!
//! Every run gets its own timestamped directory in the store and leaves a
//! summary document there, including failed runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use claim_learning::{PipelineConfig, TrainingPipeline};
//! use claim_processing::CsvSource;
//! use std::sync::Arc;
//!
//! let summary = TrainingPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .source(Arc::new(CsvSource::new("claims.csv")))
//!     .on_progress(|update| println!("{}", update.message))
//!     .build()?
//!     .run()?;
//! println!("Run {} finished: {:?}", summary.run_id, summary.outcome);
//! ```

use crate::error::PipelineError;
use crate::evaluation::ModelEvaluation;
use crate::progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
use crate::pusher::ModelPusher;
use crate::trainer::ModelTrainer;
use crate::types::{RunOutcome, RunSummary};
use chrono::{Local, Utc};
use claim_processing::{
    ArtifactStore, ArtifactStoreExt, DataIngestion, DataTransformation, DataValidation, FileSystemStore,
    PipelineConfig, RecordSource, RunLayout,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The training pipeline.
///
/// Use [`TrainingPipeline::builder()`] to construct one. A built pipeline
/// can be run any number of times; each run allocates a fresh run directory.
pub struct TrainingPipeline {
    config: PipelineConfig,
    store: Arc<dyn ArtifactStore>,
    source: Arc<dyn RecordSource>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(TrainingPipeline: Send, Sync);

impl std::fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("config", &self.config)
            .field("store", &self.store.describe())
            .field("source", &self.source.name())
            .field(
                "progress_reporter",
                &self.progress_reporter.as_ref().map(|_| "<reporter>"),
            )
            .finish()
    }
}

impl TrainingPipeline {
    pub fn builder() -> TrainingPipelineBuilder {
        TrainingPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Store the pipeline reads from and writes to.
    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn enter(&self, stage: PipelineStage, message: &str) {
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
    }

    /// Execute one training run.
    ///
    /// Returns the run summary for every run that did not error, including
    /// runs halted by validation or rejected by evaluation.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        let layout = RunLayout::allocate(self.store.as_ref(), Local::now())?;
        info!(
            "Starting training run {} (source: {}, store: {})",
            layout.run_id(),
            self.source.name(),
            self.store.describe()
        );

        let mut summary = RunSummary::started(layout.run_id(), started_at);
        match self.run_internal(&layout, &mut summary) {
            Ok(outcome) => {
                summary.outcome = Some(outcome);
                summary.finish();
                self.store.save_json(&layout.summary_key(), &summary)?;
                info!(
                    "Run {} finished: {} ({:.2}s)",
                    layout.run_id(),
                    outcome.display_name(),
                    summary.duration_seconds
                );
                self.report_progress(ProgressUpdate::complete(format!(
                    "Run {} {}",
                    layout.run_id(),
                    outcome.display_name()
                )));
                Ok(summary)
            }
            Err(e) => {
                error!("Run {} failed in {}: {}", layout.run_id(), e.stage(), e);
                summary.error = serde_json::to_value(&e).ok();
                summary.finish();
                if let Err(write_err) = self.store.save_json(&layout.summary_key(), &summary) {
                    warn!("Failed to write summary of failed run: {}", write_err);
                }
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn run_internal(&self, layout: &RunLayout, summary: &mut RunSummary) -> Result<RunOutcome, PipelineError> {
        let store = self.store.as_ref();

        // Step 1: Ingestion
        self.enter(PipelineStage::Ingesting, "Ingesting records");
        info!("Step 1: Ingesting records");
        let ingestion = DataIngestion::new(&self.config, layout, store, self.source.as_ref()).ingest()?;
        summary.ingestion = Some(ingestion.clone());

        // Step 2: Validation
        self.enter(PipelineStage::Validating, "Validating splits");
        info!("Step 2: Validating splits");
        let report = DataValidation::new(&self.config, layout, store).validate(&ingestion)?;
        summary.validation = Some(report.clone());
        if !report.is_valid {
            warn!("Validation failed, halting run: {}", report.message);
            return Ok(RunOutcome::ValidationFailed);
        }

        // Step 3: Transformation
        self.enter(PipelineStage::Transforming, "Transforming features");
        info!("Step 3: Transforming features");
        let transformation = DataTransformation::new(layout, store).transform(&ingestion, &report)?;
        summary.transformation = Some(transformation.clone());

        // Step 4: Training
        self.enter(PipelineStage::Training, "Training model");
        info!("Step 4: Training model");
        let trained = ModelTrainer::new(&self.config, layout, store).train(&transformation)?;
        summary.training = Some(trained.clone());

        // Step 5: Evaluation
        self.enter(PipelineStage::Evaluating, "Evaluating model");
        info!("Step 5: Evaluating model");
        let evaluation = ModelEvaluation::new(&self.config, store).evaluate(&ingestion, &transformation, &trained)?;
        summary.evaluation = Some(evaluation.clone());
        if !evaluation.accepted {
            return Ok(RunOutcome::Rejected);
        }

        // Step 6: Push
        self.enter(PipelineStage::Pushing, "Pushing model");
        info!("Step 6: Pushing model");
        let manifest = ModelPusher::new(layout, store).push(&transformation, &trained, &evaluation)?;
        summary.deployment = Some(manifest);

        Ok(RunOutcome::Deployed)
    }
}

/// Builder for [`TrainingPipeline`].
#[derive(Default)]
pub struct TrainingPipelineBuilder {
    config: Option<PipelineConfig>,
    store: Option<Arc<dyn ArtifactStore>>,
    source: Option<Arc<dyn RecordSource>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(TrainingPipelineBuilder: Send);

impl TrainingPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the artifact store.
    ///
    /// Defaults to a [`FileSystemStore`] rooted at `config.artifacts_dir`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set where raw records come from. Required.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid or no source was set.
    pub fn build(self) -> Result<TrainingPipeline, PipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let source = self.source.ok_or(PipelineError::MissingSource)?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileSystemStore::new(&config.artifacts_dir)));

        Ok(TrainingPipeline {
            config,
            store,
            source,
            progress_reporter: self.progress_reporter,
        })
    }
}
