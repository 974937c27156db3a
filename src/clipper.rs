//! Traversal-scoped reference holder.
//!
//! Each worker thread owns a `Clipper`. The cache takes at most one
//! reference per clipper per chunk, and the clipper remembers every hold so
//! it can release them symmetrically through [`ChunkCache::clip`] once its
//! traversal leaves a region.
//!
//! [`ChunkCache::clip`]: crate::cache::ChunkCache::clip

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::ChunkCache;
use crate::error::CacheError;
use crate::key::{Dxyz, Xyz};

/// Per-worker record of held chunk references, organized by depth.
#[derive(Default)]
pub struct Clipper {
  held: BTreeMap<u64, BTreeSet<Xyz>>,
}

impl Clipper {
  pub fn new() -> Self {
    Self::default()
  }

  /// True if this clipper already holds a reference on the chunk.
  pub fn has(&self, dxyz: Dxyz) -> bool {
    self
      .held
      .get(&dxyz.depth)
      .is_some_and(|xyzs| xyzs.contains(&dxyz.xyz))
  }

  /// Record a hold. Called by the cache when it takes a reference on this
  /// clipper's behalf.
  pub fn set(&mut self, dxyz: Dxyz) {
    self.held.entry(dxyz.depth).or_default().insert(dxyz.xyz);
  }

  /// Number of held chunks across all depths.
  pub fn len(&self) -> usize {
    self.held.values().map(BTreeSet::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.held.is_empty()
  }

  /// Take all holds, deepest depth first. The caller is responsible for
  /// releasing each batch via [`ChunkCache::clip`].
  pub fn drain(&mut self) -> Vec<(u64, BTreeSet<Xyz>)> {
    let held = std::mem::take(&mut self.held);
    held.into_iter().rev().collect()
  }

  /// Release every hold against the cache and run its purge check.
  pub fn clip(&mut self, cache: &ChunkCache) -> Result<(), CacheError> {
    for (depth, stale) in self.drain() {
      cache.clip(depth, &stale);
    }
    cache.clipped()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_and_has() {
    let mut clipper = Clipper::new();
    let dxyz = Dxyz::new(2, 1, 0, 1);

    assert!(!clipper.has(dxyz));
    clipper.set(dxyz);
    assert!(clipper.has(dxyz));
    assert!(!clipper.has(Dxyz::new(3, 1, 0, 1)));
  }

  #[test]
  fn test_set_is_idempotent() {
    let mut clipper = Clipper::new();
    let dxyz = Dxyz::new(1, 0, 0, 0);

    clipper.set(dxyz);
    clipper.set(dxyz);
    assert_eq!(clipper.len(), 1);
  }

  #[test]
  fn test_drain_deepest_first() {
    let mut clipper = Clipper::new();
    clipper.set(Dxyz::new(1, 0, 0, 0));
    clipper.set(Dxyz::new(3, 1, 1, 1));
    clipper.set(Dxyz::new(3, 1, 0, 1));
    clipper.set(Dxyz::new(2, 0, 1, 0));

    let batches = clipper.drain();
    assert!(clipper.is_empty());

    let depths: Vec<u64> = batches.iter().map(|(d, _)| *d).collect();
    assert_eq!(depths, vec![3, 2, 1]);
    assert_eq!(batches[0].1.len(), 2);
  }
}
