//! Data ingestion: pull raw records, snapshot them, split train/test.

use crate::config::PipelineConfig;
use crate::error::IngestionError;
use crate::layout::RunLayout;
use crate::store::{ArtifactStore, ArtifactStoreExt};
use crate::types::IngestionArtifact;
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where raw claim records come from.
pub trait RecordSource: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> String;

    /// Read every available raw record.
    fn fetch(&self) -> Result<DataFrame, IngestionError>;
}

/// Raw records in a CSV file with header.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<DataFrame, IngestionError> {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .and_then(|reader| reader.finish())
            .map_err(|source| IngestionError::SourceUnavailable {
                source_name: self.name(),
                source,
            })
    }
}

/// Raw records already held in memory.
#[derive(Debug, Clone)]
pub struct FrameSource {
    name: String,
    frame: DataFrame,
}

impl FrameSource {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

impl RecordSource for FrameSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn fetch(&self) -> Result<DataFrame, IngestionError> {
        Ok(self.frame.clone())
    }
}

/// Shuffle `0..rows` with `seed` and cut at `round(ratio * rows)`.
///
/// Fails when either side would be empty.
pub fn split_indices(
    rows: usize,
    ratio: f64,
    seed: u64,
) -> Result<(Vec<IdxSize>, Vec<IdxSize>), IngestionError> {
    let train_len = (ratio * rows as f64).round() as usize;
    if train_len == 0 || train_len >= rows {
        return Err(IngestionError::InvalidSplit { ratio, rows });
    }

    let mut indices: Vec<IdxSize> = (0..rows as IdxSize).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices.split_off(train_len);
    Ok((indices, test))
}

/// Ingestion stage of a training run.
pub struct DataIngestion<'a> {
    config: &'a PipelineConfig,
    layout: &'a RunLayout,
    store: &'a dyn ArtifactStore,
    source: &'a dyn RecordSource,
}

impl<'a> DataIngestion<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        layout: &'a RunLayout,
        store: &'a dyn ArtifactStore,
        source: &'a dyn RecordSource,
    ) -> Self {
        Self {
            config,
            layout,
            store,
            source,
        }
    }

    /// Read the source, write the feature-store snapshot and both splits.
    pub fn ingest(&self) -> Result<IngestionArtifact, IngestionError> {
        info!("Reading raw records from {}", self.source.name());
        let mut raw = self.source.fetch()?;
        let rows = raw.height();
        if rows == 0 {
            return Err(IngestionError::EmptySource(self.source.name()));
        }
        debug!("Raw dataset shape: {:?}", raw.shape());

        let feature_store_key = self.layout.feature_store_key();
        self.store.save_frame(&feature_store_key, &mut raw)?;
        info!("Feature store snapshot written to {}", feature_store_key);

        let (train_idx, test_idx) =
            split_indices(rows, self.config.train_ratio, self.config.split_seed)?;
        let mut train = raw.take(&IdxCa::from_vec("idx".into(), train_idx))?;
        let mut test = raw.take(&IdxCa::from_vec("idx".into(), test_idx))?;

        let train_key = self.layout.train_key();
        let test_key = self.layout.test_key();
        self.store.save_frame(&train_key, &mut train)?;
        self.store.save_frame(&test_key, &mut test)?;

        info!(
            "Split {} rows into {} train / {} test (ratio {})",
            rows,
            train.height(),
            test.height(),
            self.config.train_ratio
        );

        Ok(IngestionArtifact {
            feature_store_key,
            train_key,
            test_key,
            rows,
            train_rows: train.height(),
            test_rows: test.height(),
        })
    }
}
