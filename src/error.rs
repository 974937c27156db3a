//! Error types for cache and storage operations.
//!
//! Two failure classes exist and they are deliberately kept apart:
//!
//! - Storage I/O failures are ordinary [`CacheError`] results. The cache
//!   propagates them to the caller and never retries internally; retry policy
//!   belongs to the endpoint.
//! - Invariant violations (releasing a reference that was never taken,
//!   touching an empty chunk slot, constructing into an occupied slot) are
//!   bugs in the calling traversal logic and panic immediately.

use thiserror::Error;

/// Errors surfaced by cache, endpoint, and registry operations.
#[derive(Debug, Error)]
pub enum CacheError {
  /// An endpoint read or write failed.
  #[error("storage object `{key}`: {source}")]
  Storage {
    key: String,
    #[source]
    source: std::io::Error,
  },

  /// An endpoint has no object under the requested key.
  #[error("storage object `{key}` not found")]
  NotFound { key: String },

  /// A chunk object's byte length is not a whole number of point records.
  #[error("malformed chunk object `{key}`: {len} bytes")]
  Malformed { key: String, len: usize },

  /// Hierarchy metadata failed to encode.
  #[error("hierarchy encoding: {0}")]
  Hierarchy(#[from] serde_json::Error),
}

impl CacheError {
  /// Wrap an I/O error with the storage key it occurred on.
  pub fn storage(key: impl Into<String>, source: std::io::Error) -> Self {
    Self::Storage {
      key: key.into(),
      source,
    }
  }
}
