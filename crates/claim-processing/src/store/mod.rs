//! Artifact persistence.
//!
//! Stages read and write artifacts through [`ArtifactStore`], a byte store
//! keyed by `/`-separated relative paths. [`ArtifactStoreExt`] layers typed
//! helpers for JSON documents and CSV tables on top of any backend.
//!
//! Every `put` is atomic: a reader sees either the previous bytes or the new
//! bytes under a key, never a partial write.

mod filesystem;
mod memory;

pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;

use crate::error::StoreError;
use polars::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Cursor;

/// Byte-level artifact storage.
///
/// Implementations must be `Send + Sync` so a store can be shared between
/// the training pipeline and concurrent inference readers.
pub trait ArtifactStore: Send + Sync {
    /// Atomically write `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the bytes stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored there.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Check whether an artifact exists under `key`.
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Check whether any artifact lives under the `prefix/` namespace.
    fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError>;

    /// Remove the artifact under `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Copy the artifact at `from` to `to`.
    fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let bytes = self.get(from)?;
        self.put(to, &bytes)
    }

    /// Human-readable location, used in log lines.
    fn describe(&self) -> String;
}

/// Typed helpers available on every [`ArtifactStore`], including trait objects.
pub trait ArtifactStoreExt: ArtifactStore {
    /// Serialize `value` as pretty JSON and store it under `key`.
    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.put(key, &bytes)
    }

    /// Load and deserialize the JSON document under `key`.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let bytes = self.get(key)?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })
    }

    /// Write `df` as a CSV table with header under `key`.
    fn save_frame(&self, key: &str, df: &mut DataFrame) -> Result<(), StoreError> {
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(df)
            .map_err(|source| StoreError::Frame {
                key: key.to_string(),
                source,
            })?;
        self.put(key, &buffer)
    }

    /// Read the CSV table under `key`.
    fn load_frame(&self, key: &str) -> Result<DataFrame, StoreError> {
        let bytes = self.get(key)?;
        CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|source| StoreError::Frame {
                key: key.to_string(),
                source,
            })
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStoreExt for S {}

/// Reject keys that are empty, absolute or climb out of the store root.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Join key segments with `/`.
pub fn join_key<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| s.as_ref().trim_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

static_assertions::assert_impl_all!(FileSystemStore: Send, Sync);
static_assertions::assert_impl_all!(InMemoryStore: Send, Sync);
