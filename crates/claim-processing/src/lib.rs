//! Claim Processing Library
//!
//! Data side of the vehicle-insurance claim approval pipeline, built on
//! Polars.
//!
//! # Overview
//!
//! - **Ingestion**: pull raw records from a [`RecordSource`], snapshot them and
//!   split them into train/test with a seeded shuffle
//! - **Validation**: schema checks and per-column drift tests between the splits
//! - **Transformation**: categorical encoding plus a [`FeatureTransformer`] fit on
//!   the training split only
//! - **Artifact store**: a byte store trait with filesystem and in-memory backends
//!
//! Every stage reads its inputs from and writes its outputs to an
//! [`ArtifactStore`] under the keys of a [`RunLayout`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use claim_processing::*;
//!
//! let config = PipelineConfig::default();
//! let store = FileSystemStore::new(&config.artifacts_dir);
//! let layout = RunLayout::allocate(&store, chrono::Local::now())?;
//! let source = CsvSource::new("data.csv");
//!
//! let ingested = DataIngestion::new(&config, &layout, &store, &source).ingest()?;
//! let report = DataValidation::new(&config, &layout, &store).validate(&ingested)?;
//! let transformed = DataTransformation::new(&layout, &store).transform(&ingested, &report)?;
//! ```

pub mod config;
pub mod constants;
pub mod drift;
pub mod encoding;
pub mod error;
pub mod ingestion;
pub mod layout;
pub mod store;
pub mod synthetic;
pub mod transformation;
pub mod transformer;
pub mod types;
pub mod utils;
pub mod validation;

pub use config::{ConfigValidationError, Criterion, ForestParams, MaxFeatures, PipelineConfig, PipelineConfigBuilder};
pub use encoding::{EncodedData, EncodedRow, encode_frame};
pub use error::{IngestionError, RecordError, StoreError, TransformationError, ValidationError};
pub use ingestion::{CsvSource, DataIngestion, FrameSource, RecordSource};
pub use layout::{DeployedLayout, RunLayout};
pub use store::{ArtifactStore, ArtifactStoreExt, FileSystemStore, InMemoryStore};
pub use synthetic::SyntheticClaims;
pub use transformation::DataTransformation;
pub use transformer::FeatureTransformer;
pub use types::{
    ApplicantForm, ColumnDrift, DriftTest, Gender, IngestionArtifact, Record,
    TransformationArtifact, ValidationReport, VehicleAge,
};
pub use validation::DataValidation;
