//! Per-index owner wiring the cache to its hierarchy and storage.
//!
//! A `Registry` owns one [`ChunkCache`] and one [`Hierarchy`], shares an
//! [`IoPool`], and holds the durable/scratch endpoint pair. Point insertion
//! passes straight through to the cache; `save` persists everything the
//! index owns.

use std::sync::Arc;

use tracing::info;

use crate::cache::{ChunkCache, Info};
use crate::chunk::PointRecord;
use crate::clipper::Clipper;
use crate::endpoint::Endpoint;
use crate::error::CacheError;
use crate::hierarchy::Hierarchy;
use crate::key::{Bounds, ChunkKey};
use crate::threading::IoPool;

/// Safety bound on overflow descent: an index deeper than this indicates a
/// routing bug, not a dense region.
const MAX_MERGE_DEPTH: u64 = 64;

/// Owner of one index's cache, hierarchy, and storage endpoints.
pub struct Registry {
  bounds: Bounds,
  hierarchy: Arc<Hierarchy>,
  out: Arc<dyn Endpoint>,
  cache: ChunkCache,
}

impl Registry {
  pub fn new(
    bounds: Bounds,
    io: Arc<IoPool>,
    out: Arc<dyn Endpoint>,
    tmp: Arc<dyn Endpoint>,
    cache_size: u64,
    max_depth: u64,
  ) -> Self {
    let hierarchy = Arc::new(Hierarchy::new());
    let cache = ChunkCache::new(
      Arc::clone(&hierarchy),
      io,
      Arc::clone(&out),
      tmp,
      cache_size,
      max_depth,
    );
    Self {
      bounds,
      hierarchy,
      out,
      cache,
    }
  }

  /// Insert a point into the chunk addressed by `ck`. Pass-through to
  /// [`ChunkCache::insert`]; `false` means overflow and the caller retries
  /// one level deeper.
  pub fn add_point(
    &self,
    point: &PointRecord,
    ck: &ChunkKey,
    clipper: &mut Clipper,
  ) -> Result<bool, CacheError> {
    self.cache.insert(point, ck, clipper)
  }

  /// Persist the index: flush every owned chunk to durable storage, then
  /// write hierarchy metadata banded at `hierarchy_step`.
  pub fn save(&self, hierarchy_step: u64) -> Result<(), CacheError> {
    self.cache.flush()?;
    self.hierarchy.save(self.out.as_ref(), hierarchy_step)?;
    info!(
      chunks = self.cache.owned_keys().len(),
      "registry saved to durable storage"
    );
    Ok(())
  }

  /// Fold another registry's chunks into this one.
  ///
  /// Every point of every chunk `other` owns, resident or serialized, is
  /// re-inserted here, descending on overflow exactly like a normal
  /// insertion pass, with `clipper` bounding the working set. The clipper's
  /// holds are released and the budget enforced before returning.
  pub fn merge(&self, other: &Registry, clipper: &mut Clipper) -> Result<(), CacheError> {
    for dxyz in other.cache.owned_keys() {
      let points = other.cache.points_of(&dxyz)?;
      let base = ChunkKey::from_dxyz(self.bounds, dxyz);

      for point in &points {
        let mut ck = base;
        while !self.cache.insert(point, &ck, clipper)? {
          assert!(
            ck.depth() < MAX_MERGE_DEPTH,
            "merge descent exceeded depth {MAX_MERGE_DEPTH}"
          );
          ck = ck.step(point.position());
        }
      }
    }
    clipper.clip(&self.cache)
  }

  /// Root chunk key over this index's bounds.
  pub fn root_key(&self) -> ChunkKey {
    ChunkKey::root(self.bounds)
  }

  pub fn bounds(&self) -> Bounds {
    self.bounds
  }

  pub fn hierarchy(&self) -> &Hierarchy {
    &self.hierarchy
  }

  pub fn cache(&self) -> &ChunkCache {
    &self.cache
  }

  /// Activity snapshot since the previous latch.
  pub fn latch_info(&self) -> Info {
    self.cache.latch_info()
  }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
