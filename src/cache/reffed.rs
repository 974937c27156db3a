//! Cache slot: at most one resident chunk plus its reference count.
//!
//! Two locks govern a slot's life. The owning slice's lock protects the map
//! entry itself; the slot's own lock (inside [`ReffedChunk`]) protects
//! residency transitions (construct, revive, reset) and is the lock held
//! across deserialize-on-demand and serialize-before-erase.
//!
//! The reference count is the sole authority for eviction eligibility.
//! Decrementing it below zero has no legitimate code path and panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::hierarchy::Hierarchy;
use crate::key::ChunkKey;
use crate::spin::SpinMutex;

/// Residency state of one slot, only reachable under the slot lock.
#[derive(Default)]
pub struct Slot {
  chunk: Option<Arc<Chunk>>,
}

impl Slot {
  /// True iff a chunk is resident.
  pub fn exists(&self) -> bool {
    self.chunk.is_some()
  }

  /// The resident chunk, if any.
  pub fn get(&self) -> Option<Arc<Chunk>> {
    self.chunk.clone()
  }

  /// The resident chunk. Panics if the slot is empty; callers must ensure
  /// residency under this slot's lock first.
  pub fn chunk(&self) -> Arc<Chunk> {
    self
      .chunk
      .clone()
      .unwrap_or_else(|| panic!("chunk slot is empty"))
  }

  /// Construct a fresh chunk into an empty slot. Double-construction is a
  /// caller bug and panics.
  pub fn assign(&mut self, key: &ChunkKey, hierarchy: &Hierarchy) -> Arc<Chunk> {
    self.install(Chunk::new(key, hierarchy))
  }

  /// Place an already-built chunk (a revival) into an empty slot.
  pub fn install(&mut self, chunk: Chunk) -> Arc<Chunk> {
    assert!(
      self.chunk.is_none(),
      "assign into occupied slot for chunk {}",
      chunk.key().dxyz
    );
    let chunk = Arc::new(chunk);
    self.chunk = Some(chunk.clone());
    chunk
  }

  /// Discard the resident chunk, freeing its memory.
  pub fn reset(&mut self) {
    self.chunk = None;
  }
}

/// A cache slot with its concurrent-holder reference count.
#[derive(Default)]
pub struct ReffedChunk {
  refs: AtomicU64,
  slot: SpinMutex<Slot>,
}

impl ReffedChunk {
  pub fn new() -> Self {
    Self::default()
  }

  /// Take a reference on behalf of a holder.
  pub fn add_ref(&self) {
    self.refs.fetch_add(1, Ordering::AcqRel);
  }

  /// Release a reference, returning the remaining count. Releasing a
  /// reference that was never taken panics.
  pub fn del_ref(&self) -> u64 {
    let prev = self
      .refs
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
      .unwrap_or_else(|_| panic!("chunk reference count underflow"));
    prev - 1
  }

  /// Current holder count.
  pub fn count(&self) -> u64 {
    self.refs.load(Ordering::Acquire)
  }

  /// Run `f` with the slot lock held. All residency transitions, and any
  /// I/O tied to them, happen inside this scope.
  pub fn with_slot<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> R {
    let mut slot = self.slot.lock();
    f(&mut slot)
  }

  /// True iff a chunk is currently resident.
  pub fn exists(&self) -> bool {
    self.with_slot(|slot| slot.exists())
  }

  /// The resident chunk; panics if absent.
  pub fn chunk(&self) -> Arc<Chunk> {
    self.with_slot(|slot| slot.chunk())
  }

  /// Construct a fresh chunk into this slot; panics if already occupied.
  pub fn assign(&self, key: &ChunkKey, hierarchy: &Hierarchy) -> Arc<Chunk> {
    self.with_slot(|slot| slot.assign(key, hierarchy))
  }

  /// Free the resident chunk. The reference count must be zero.
  pub fn reset(&self) {
    assert_eq!(self.count(), 0, "reset of a slot with live references");
    self.with_slot(|slot| slot.reset());
  }
}

#[cfg(test)]
#[path = "reffed_test.rs"]
mod reffed_test;
