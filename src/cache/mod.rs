//! Sharded, bounded, concurrent chunk cache.
//!
//! The cache maps chunk identity to a [`ReffedChunk`] slot across 64
//! independently spin-locked slices, selected by [`slice_index`] from the
//! chunk's depth. It decides which chunks stay resident, serializes
//! zero-reference chunks to storage under budget pressure, and revives them
//! on demand.
//!
//! # Locking discipline
//!
//! 1. Slice lock: guards one slice's `Dxyz -> ReffedChunk` map and all
//!    reference count updates. Held only for map operations, never across
//!    I/O. Map keys are depth-qualified because depths 64 apart share a
//!    slice.
//! 2. Slot lock (inside [`ReffedChunk`]): guards one chunk's residency
//!    transitions. Deserialize-on-demand and serialize-before-erase run
//!    while holding it, after the slice lock has been released, so other
//!    chunks, including others in the same slice, stay available.
//!
//! Slice before slot, always; neither is ever acquired while holding the
//! owned-set lock.

mod reffed;

pub use reffed::{ReffedChunk, Slot};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, trace};

use crate::chunk::{self, Chunk, PointRecord};
use crate::clipper::Clipper;
use crate::endpoint::Endpoint;
use crate::error::CacheError;
use crate::hierarchy::Hierarchy;
use crate::key::{slice_index, ChunkKey, Dxyz, Xyz, SLICE_COUNT};
use crate::spin::SpinMutex;
use crate::threading::IoPool;

/// Default budget: number of concurrently resident chunks.
pub const DEFAULT_CACHE_SIZE: u64 = 64;

/// Read-and-reset monitoring snapshot: activity since the previous latch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Info {
  /// Chunks serialized to storage.
  pub written: u64,
  /// Chunks deserialized back from storage (revivals).
  pub read: u64,
  /// Net change in resident chunks. Signed: evictions after a latch can
  /// drive the delta negative.
  pub alive: i64,
}

#[derive(Default)]
struct Counters {
  written: AtomicU64,
  read: AtomicU64,
  alive: AtomicI64,
  /// Current resident chunk count. Drives purge decisions; not latched.
  resident: AtomicU64,
}

type Slice = SpinMutex<BTreeMap<Dxyz, Arc<ReffedChunk>>>;

/// Bounded concurrent map from chunk identity to resident chunk, with
/// eviction to two-tier storage.
pub struct ChunkCache {
  hierarchy: Arc<Hierarchy>,
  io: Arc<IoPool>,
  out: Arc<dyn Endpoint>,
  tmp: Arc<dyn Endpoint>,
  cache_size: u64,
  /// Chunks at or beyond this depth are never evicted. Zero disables the
  /// limit.
  max_depth: u64,
  slices: [Slice; SLICE_COUNT],
  owned: SpinMutex<BTreeSet<Dxyz>>,
  counters: Counters,
}

impl ChunkCache {
  pub fn new(
    hierarchy: Arc<Hierarchy>,
    io: Arc<IoPool>,
    out: Arc<dyn Endpoint>,
    tmp: Arc<dyn Endpoint>,
    cache_size: u64,
    max_depth: u64,
  ) -> Self {
    Self {
      hierarchy,
      io,
      out,
      tmp,
      cache_size,
      max_depth,
      slices: std::array::from_fn(|_| SpinMutex::new(BTreeMap::new())),
      owned: SpinMutex::new(BTreeSet::new()),
      counters: Counters::default(),
    }
  }

  /// Resolve the chunk for `ck` (constructing or reviving it if absent),
  /// take a reference on the clipper's behalf if it holds none, and hand
  /// the point to the chunk.
  ///
  /// Returns the chunk's verdict: `true` if the point was stored at this
  /// depth, `false` on overflow (the caller retries one level deeper).
  pub fn insert(
    &self,
    point: &PointRecord,
    ck: &ChunkKey,
    clipper: &mut Clipper,
  ) -> Result<bool, CacheError> {
    let chunk = self.add_ref(ck, clipper)?;
    Ok(chunk.accept(point))
  }

  /// Find-or-create the slot, pin it with a reference, and materialize the
  /// chunk.
  fn add_ref(&self, ck: &ChunkKey, clipper: &mut Clipper) -> Result<Arc<Chunk>, CacheError> {
    let dxyz = ck.dxyz;

    // Structural phase under the slice lock only.
    let reffed = {
      let mut slice = self.slices[slice_index(dxyz.depth)].lock();
      let reffed = slice.entry(dxyz).or_default().clone();
      if !clipper.has(dxyz) {
        reffed.add_ref();
        clipper.set(dxyz);
      }
      reffed
    };

    // Residency phase under the slot lock; any deserialization I/O happens
    // here, with the slice already released.
    reffed.with_slot(|slot| {
      if let Some(chunk) = slot.get() {
        return Ok(chunk);
      }

      let owned = self.owned.lock().contains(&dxyz);
      let chunk = if owned {
        let revived = Chunk::load(ck, self.tmp.as_ref(), self.out.as_ref())?;
        self.counters.read.fetch_add(1, Ordering::Relaxed);
        debug!(chunk = %dxyz, points = revived.len(), "revived chunk from storage");
        slot.install(revived)
      } else {
        self.owned.lock().insert(dxyz);
        trace!(chunk = %dxyz, "constructed chunk");
        slot.assign(ck, &self.hierarchy)
      };

      self.counters.alive.fetch_add(1, Ordering::Relaxed);
      self.counters.resident.fetch_add(1, Ordering::Relaxed);
      Ok(chunk)
    })
  }

  /// Release a batch of holds at one depth. Chunks reaching zero references
  /// become eviction candidates; actual eviction waits for budget pressure.
  ///
  /// Panics if a released chunk was never tracked or its count is already
  /// zero.
  pub fn clip(&self, depth: u64, stale: &BTreeSet<Xyz>) {
    let slice = self.slices[slice_index(depth)].lock();
    for xyz in stale {
      let dxyz = Dxyz { depth, xyz: *xyz };
      let reffed = slice
        .get(&dxyz)
        .unwrap_or_else(|| panic!("clip of untracked chunk {dxyz}"));
      reffed.del_ref();
    }
  }

  /// Signal the end of a clip pass: enforce the configured budget.
  pub fn clipped(&self) -> Result<(), CacheError> {
    self.maybe_purge(self.cache_size)
  }

  /// Serialize and erase zero-reference chunks until the resident count is
  /// within `max_cache_size`, or no eligible candidate remains.
  fn maybe_purge(&self, max_cache_size: u64) -> Result<(), CacheError> {
    if self.resident() <= max_cache_size {
      return Ok(());
    }

    for dxyz in self.purge_candidates() {
      if self.resident() <= max_cache_size {
        break;
      }
      self.maybe_serialize(&dxyz)?;
      self.maybe_erase(&dxyz);
    }
    Ok(())
  }

  /// Zero-reference resident chunks eligible for eviction, in slice/key
  /// order. Deterministic, not recency-based.
  ///
  /// Slot inspection waits until the slice guard is dropped: a chunk
  /// mid-revival holds its slot lock across storage I/O, and waiting on it
  /// with the slice locked would stall every insert into that slice. The
  /// ref-count check here is only a pre-filter; serialize and erase
  /// re-validate under the slot lock.
  fn purge_candidates(&self) -> Vec<Dxyz> {
    let mut candidates = Vec::new();
    for slice in &self.slices {
      let unpinned: Vec<(Dxyz, Arc<ReffedChunk>)> = {
        let map = slice.lock();
        map
          .iter()
          .filter(|(dxyz, reffed)| {
            reffed.count() == 0 && (self.max_depth == 0 || dxyz.depth < self.max_depth)
          })
          .map(|(dxyz, reffed)| (*dxyz, Arc::clone(reffed)))
          .collect()
      };
      for (dxyz, reffed) in unpinned {
        if reffed.with_slot(|slot| slot.exists()) {
          candidates.push(dxyz);
        }
      }
    }
    candidates
  }

  /// Write a zero-reference chunk's contents to the scratch endpoint.
  ///
  /// Re-validates the reference count under the slot lock: a chunk that
  /// picked up a holder since candidate selection is skipped, as is one
  /// already serialized and unmodified. A failed write leaves the slot
  /// resident and propagates.
  fn maybe_serialize(&self, dxyz: &Dxyz) -> Result<(), CacheError> {
    let Some(reffed) = self.find(dxyz) else {
      return Ok(());
    };
    reffed.with_slot(|slot| {
      if reffed.count() != 0 {
        return Ok(());
      }
      let Some(chunk) = slot.get() else {
        return Ok(());
      };
      if !chunk.dirty() {
        return Ok(());
      }
      let bytes = chunk.save(self.tmp.as_ref(), &self.hierarchy)?;
      self.counters.written.fetch_add(1, Ordering::Relaxed);
      debug!(chunk = %dxyz, bytes, "serialized chunk to scratch");
      Ok(())
    })
  }

  /// Free the in-memory chunk of a zero-reference, fully serialized slot.
  /// The cache entry and the ownership record persist for later revival.
  fn maybe_erase(&self, dxyz: &Dxyz) {
    let Some(reffed) = self.find(dxyz) else {
      return;
    };
    reffed.with_slot(|slot| {
      if reffed.count() != 0 {
        return;
      }
      let Some(chunk) = slot.get() else {
        return;
      };
      if chunk.dirty() {
        // Modified since serialization; the next purge pass rewrites it.
        return;
      }
      slot.reset();
      self.counters.alive.fetch_sub(1, Ordering::Relaxed);
      self.counters.resident.fetch_sub(1, Ordering::Relaxed);
      trace!(chunk = %dxyz, "erased chunk");
    });
  }

  /// Serialize every owned chunk to the durable endpoint, fanning the writes
  /// out across the I/O pool. Resident chunks are written from memory;
  /// scratch-only chunks are promoted by object copy. Reference counts are
  /// not consulted and chunks stay resident.
  pub fn flush(&self) -> Result<(), CacheError> {
    let owned: Vec<Dxyz> = self.owned.lock().iter().copied().collect();
    if owned.is_empty() {
      return Ok(());
    }

    let mut jobs: Vec<Box<dyn FnOnce() -> Result<(), CacheError> + Send>> = Vec::new();
    for dxyz in owned {
      let resident = self
        .find(&dxyz)
        .and_then(|reffed| reffed.with_slot(|slot| slot.get()));
      let out = Arc::clone(&self.out);
      let tmp = Arc::clone(&self.tmp);
      let hierarchy = Arc::clone(&self.hierarchy);

      jobs.push(Box::new(move || match resident {
        Some(chunk) => chunk.save(out.as_ref(), &hierarchy).map(|_| ()),
        None => {
          let object = chunk::object_key(dxyz);
          match tmp.get(&object) {
            Ok(bytes) => out.put(&object, &bytes),
            // Never spilled to scratch: the object must already be durable.
            Err(CacheError::NotFound { .. }) => out.get(&object).map(|_| ()),
            Err(e) => Err(e),
          }
        }
      }));
    }

    let wrote = jobs.len();
    for result in self.io.run_all(jobs) {
      result?;
    }
    debug!(chunks = wrote, "flushed owned chunks to durable storage");
    Ok(())
  }

  /// A chunk's points, read from residency or storage without disturbing
  /// the cache. Used when merging registries.
  pub fn points_of(&self, dxyz: &Dxyz) -> Result<Vec<PointRecord>, CacheError> {
    if let Some(reffed) = self.find(dxyz) {
      if let Some(chunk) = reffed.with_slot(|slot| slot.get()) {
        return Ok(chunk.points());
      }
    }

    let object = chunk::object_key(*dxyz);
    let bytes = match self.tmp.get(&object) {
      Ok(bytes) => bytes,
      Err(CacheError::NotFound { .. }) => self.out.get(&object)?,
      Err(e) => return Err(e),
    };
    chunk::decode_points(&object, &bytes)
  }

  /// Identities this cache is responsible for persisting, resident or not.
  pub fn owned_keys(&self) -> Vec<Dxyz> {
    self.owned.lock().iter().copied().collect()
  }

  /// Current resident chunk count.
  pub fn resident(&self) -> u64 {
    self.counters.resident.load(Ordering::Relaxed)
  }

  /// Atomically read and reset the activity counters. Two successive
  /// latches with no activity in between return all zeroes.
  pub fn latch_info(&self) -> Info {
    Info {
      written: self.counters.written.swap(0, Ordering::Relaxed),
      read: self.counters.read.swap(0, Ordering::Relaxed),
      alive: self.counters.alive.swap(0, Ordering::Relaxed),
    }
  }

  fn find(&self, dxyz: &Dxyz) -> Option<Arc<ReffedChunk>> {
    let slice = self.slices[slice_index(dxyz.depth)].lock();
    slice.get(dxyz).cloned()
  }
}

impl Drop for ChunkCache {
  fn drop(&mut self) {
    if let Err(e) = self.flush() {
      error!(error = %e, "chunk cache teardown flush failed");
    }
  }
}
