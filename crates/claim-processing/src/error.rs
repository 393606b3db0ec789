//! Error types for the data-side pipeline stages.
//!
//! Each stage owns its own `thiserror` enum so a failure names the stage it
//! came from and keeps the underlying cause reachable through `source()`.
//! Every error exposes a stable `error_code()` for callers that branch on
//! the kind of failure rather than its message.

use polars::error::PolarsError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Failures of the artifact store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No artifact is stored under the key.
    #[error("Artifact '{key}' not found")]
    NotFound { key: String },

    /// Key is empty, absolute or escapes the store root.
    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("IO error on artifact '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize artifact '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read or write table '{key}': {source}")]
    Frame {
        key: String,
        #[source]
        source: PolarsError,
    },

    /// Backend-specific failure that has no richer cause.
    #[error("Artifact store failure on '{key}': {reason}")]
    Backend { key: String, reason: String },
}

impl StoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::InvalidKey(_) => "INVALID_ARTIFACT_KEY",
            Self::Io { .. } => "STORE_IO_ERROR",
            Self::Serialization { .. } => "STORE_SERIALIZATION_ERROR",
            Self::Frame { .. } => "STORE_FRAME_ERROR",
            Self::Backend { .. } => "STORE_BACKEND_ERROR",
        }
    }

    /// Check if the error only says the artifact is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures of the ingestion stage.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The record source could not be read.
    #[error("Record source '{source_name}' is unavailable: {source}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        source: PolarsError,
    },

    /// The record source produced no rows.
    #[error("Record source '{0}' returned no rows")]
    EmptySource(String),

    /// The split ratio leaves one side empty for this many rows.
    #[error("Train ratio {ratio} leaves an empty split for {rows} rows")]
    InvalidSplit { ratio: f64, rows: usize },

    #[error("Failed to split dataset: {0}")]
    Frame(#[from] PolarsError),

    #[error("Failed to persist ingested data: {0}")]
    Store(#[from] StoreError),
}

impl IngestionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::EmptySource(_) => "EMPTY_SOURCE",
            Self::InvalidSplit { .. } => "INVALID_SPLIT",
            Self::Frame(_) => "INGESTION_FRAME_ERROR",
            Self::Store(e) => e.error_code(),
        }
    }
}

/// Failures of the validation stage.
///
/// An invalid dataset is not an error; it produces a report with
/// `is_valid == false`. These variants cover unreadable inputs.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Split file '{key}' is missing or unreadable: {source}")]
    SplitUnavailable {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Column '{column}' is malformed: {source}")]
    Malformed {
        column: String,
        #[source]
        source: TransformationError,
    },

    #[error("Failed to write validation report: {0}")]
    Store(#[from] StoreError),
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SplitUnavailable { .. } => "SPLIT_UNAVAILABLE",
            Self::Malformed { .. } => "MALFORMED_COLUMN",
            Self::Store(e) => e.error_code(),
        }
    }
}

/// Failures of encoding and the feature transformer.
#[derive(Error, Debug)]
pub enum TransformationError {
    /// The validation report did not pass.
    #[error("Validation did not pass: {0}")]
    ValidationFailed(String),

    #[error("Column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("Column '{column}' has dtype {dtype}, expected {expected}")]
    WrongDtype {
        column: String,
        dtype: String,
        expected: &'static str,
    },

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Training split has no labelled rows")]
    EmptyTrainingSplit,

    #[error("No observed values in column '{0}' to fit on")]
    NoObservedValues(String),

    #[error("Record has {actual} features, expected {expected}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Polars error: {0}")]
    Frame(#[from] PolarsError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),
}

impl TransformationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::MissingColumn(_) => "COLUMN_NOT_FOUND",
            Self::WrongDtype { .. } => "WRONG_DTYPE",
            Self::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            Self::EmptyTrainingSplit => "EMPTY_TRAINING_SPLIT",
            Self::NoObservedValues(_) => "NO_OBSERVED_VALUES",
            Self::FeatureCount { .. } => "FEATURE_COUNT_MISMATCH",
            Self::Frame(_) => "POLARS_ERROR",
            Self::Store(e) => e.error_code(),
        }
    }

    /// Degenerate data rather than a broken environment.
    pub fn is_data_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Frame(_))
    }
}

/// A single inference record violates the field contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Field '{field}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field '{field}' = {value} must be 0 or 1")]
    NotBinary { field: &'static str, value: u8 },

    #[error("Field '{field}' is not a finite number")]
    NotFinite { field: &'static str },

    #[error("Vehicle age cannot be both under one year and over two years")]
    ConflictingVehicleAge,

    #[error("Unrecognized value '{value}' for '{field}'")]
    UnknownValue { field: &'static str, value: String },
}

macro_rules! impl_code_serialize {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    let mut state = serializer.serialize_struct(stringify!($ty), 2)?;
                    state.serialize_field("code", &self.error_code())?;
                    state.serialize_field("message", &self.to_string())?;
                    state.end()
                }
            }
        )+
    };
}

impl_code_serialize!(StoreError, IngestionError, ValidationError, TransformationError);
