//! Shipyard Artifact
//!
//! This crate provides the artifact storage trait and implementations for shipyard.
//! An artifact is a named bundle of files produced by one job and consumed by a
//! later one.
//!
//! The [`Store`] trait defines the backend layer for artifact storage: flat keys
//! mapped to byte streams. [`bundle`] builds named file bundles on top of it,
//! keyed `<execution_id>/<artifact_name>/<relative_path>`.
//!
//! The trait uses async streaming for efficient handling of large files.

pub mod bundle;
mod fs;

pub use fs::FsStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for artifact data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested artifact was not found.
  #[error("artifact not found: {0}")]
  NotFound(String),

  /// The key would escape the store.
  #[error("invalid artifact key: {0}")]
  InvalidKey(String),

  /// A download would overwrite a file that is already there.
  #[error("refusing to overwrite existing file {0}")]
  AlreadyExists(String),

  /// An upload contained no files.
  #[error("no files found at {0}")]
  Empty(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Artifact storage trait.
///
/// Implementations provide the actual storage backend. Keys are `/`-separated
/// relative paths.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an artifact file by key.
  ///
  /// Returns a stream of bytes for efficient handling of large files.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an artifact file.
  ///
  /// Accepts a stream of bytes for efficient handling of large files.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Delete an artifact file by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// List all keys under a prefix, sorted.
  async fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

/// Check that a key is a relative path without `..` components.
pub(crate) fn validate_key(key: &str) -> Result<(), Error> {
  let bad = key.is_empty()
    || key.starts_with('/')
    || key.contains('\\')
    || key.split('/').any(|part| part == ".." || part == ".");
  if bad {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(())
}
