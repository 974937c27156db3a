//! Storage endpoints: the durable/scratch persistence seam.
//!
//! The cache writes each chunk as one object, content-addressed by its
//! [`Dxyz`](crate::key::Dxyz) naming convention, and assumes nothing beyond
//! basic put/get durability. Two endpoints are wired at construction: the
//! durable output (`out`) and a scratch tier (`tmp`) that absorbs
//! mid-build evictions.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::spin::SpinMutex;

/// Basic put/get object storage.
///
/// Endpoints must tolerate concurrent writes to distinct keys; the cache
/// imposes no cross-chunk ordering.
pub trait Endpoint: Send + Sync {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError>;
  fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;
}

/// Filesystem-backed endpoint rooted at a directory.
///
/// Writes go through a sibling `.partial` file and a rename, so a crash
/// mid-put never leaves a truncated object under the final key.
pub struct DirEndpoint {
  root: PathBuf,
}

impl DirEndpoint {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_of(&self, key: &str) -> PathBuf {
    self.root.join(key)
  }
}

impl Endpoint for DirEndpoint {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
    let path = self.path_of(key);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|e| CacheError::storage(key, e))?;
    }
    let partial = self.path_of(&format!("{key}.partial"));
    fs::write(&partial, data).map_err(|e| CacheError::storage(key, e))?;
    fs::rename(&partial, &path).map_err(|e| CacheError::storage(key, e))
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
    match fs::read(self.path_of(key)) {
      Ok(data) => Ok(data),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound {
        key: key.to_owned(),
      }),
      Err(e) => Err(CacheError::storage(key, e)),
    }
  }
}

/// In-memory endpoint for tests and merge staging.
#[derive(Default)]
pub struct MemEndpoint {
  objects: SpinMutex<HashMap<String, Vec<u8>>>,
}

impl MemEndpoint {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored objects.
  pub fn len(&self) -> usize {
    self.objects.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.lock().is_empty()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.objects.lock().contains_key(key)
  }
}

impl Endpoint for MemEndpoint {
  fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
    self.objects.lock().insert(key.to_owned(), data.to_vec());
    Ok(())
  }

  fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
    self
      .objects
      .lock()
      .get(key)
      .cloned()
      .ok_or_else(|| CacheError::NotFound {
        key: key.to_owned(),
      })
  }
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod endpoint_test;
