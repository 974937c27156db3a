//! The octree node: point storage with an accept-or-overflow policy.
//!
//! The cache treats a chunk as an opaque owned resource with three
//! operations: construct from identity, accept a point, and serialize to or
//! deserialize from a storage endpoint. Point acceptance is internally
//! spin-locked so ref-holding threads may insert concurrently without the
//! cache serializing them.

use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::{Pod, Zeroable};

use crate::endpoint::Endpoint;
use crate::error::CacheError;
use crate::hierarchy::Hierarchy;
use crate::key::{ChunkKey, Dxyz};
use crate::spin::SpinMutex;

/// Points a chunk holds before overflowing to its children.
pub const CHUNK_CAPACITY: usize = 256;

/// One indexed point: position plus intensity, padded to a Pod layout so
/// chunk payloads byte-cast directly.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointRecord {
  pub position: [f64; 3],
  pub intensity: u16,
  _pad: [u16; 3],
}

impl PointRecord {
  pub fn new(position: [f64; 3], intensity: u16) -> Self {
    Self {
      position,
      intensity,
      _pad: [0; 3],
    }
  }

  #[inline]
  pub fn position(&self) -> glam::DVec3 {
    glam::DVec3::from_array(self.position)
  }
}

/// Storage object key for a chunk identity.
pub fn object_key(dxyz: Dxyz) -> String {
  format!("data/{dxyz}")
}

/// Decode a chunk object's payload into point records.
pub fn decode_points(key: &str, bytes: &[u8]) -> Result<Vec<PointRecord>, CacheError> {
  if bytes.len() % std::mem::size_of::<PointRecord>() != 0 {
    return Err(CacheError::Malformed {
      key: key.to_owned(),
      len: bytes.len(),
    });
  }
  Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// A node of the spatial index holding point data for one octree region.
pub struct Chunk {
  key: ChunkKey,
  points: SpinMutex<Vec<PointRecord>>,
  /// Set on accept, cleared on save/load. An unmodified chunk may be erased
  /// after serialization without a second write.
  dirty: AtomicBool,
}

impl Chunk {
  /// Construct an empty chunk for an identity. The hierarchy's recorded
  /// count seeds the buffer reservation so revived identities do not regrow.
  pub fn new(key: &ChunkKey, hierarchy: &Hierarchy) -> Self {
    let seen = hierarchy.get(key.dxyz).min(CHUNK_CAPACITY as u64) as usize;
    Self {
      key: *key,
      points: SpinMutex::new(Vec::with_capacity(seen)),
      dirty: AtomicBool::new(true),
    }
  }

  /// Deserialize a chunk from the scratch endpoint, falling back to the
  /// durable endpoint for identities only present in a finished index.
  pub fn load(
    key: &ChunkKey,
    tmp: &dyn Endpoint,
    out: &dyn Endpoint,
  ) -> Result<Self, CacheError> {
    let object = object_key(key.dxyz);
    let bytes = match tmp.get(&object) {
      Ok(bytes) => bytes,
      Err(CacheError::NotFound { .. }) => out.get(&object)?,
      Err(e) => return Err(e),
    };
    let points = decode_points(&object, &bytes)?;
    Ok(Self {
      key: *key,
      points: SpinMutex::new(points),
      dirty: AtomicBool::new(false),
    })
  }

  /// Serialize to an endpoint and record the point count in the hierarchy.
  /// Returns the number of bytes written.
  pub fn save(&self, endpoint: &dyn Endpoint, hierarchy: &Hierarchy) -> Result<u64, CacheError> {
    let object = object_key(self.key.dxyz);
    let (bytes, count) = {
      let points = self.points.lock();
      let bytes: &[u8] = bytemuck::cast_slice(points.as_slice());
      (bytes.to_vec(), points.len() as u64)
    };
    endpoint.put(&object, &bytes)?;
    hierarchy.set(self.key.dxyz, count);
    self.dirty.store(false, Ordering::Release);
    Ok(bytes.len() as u64)
  }

  /// Store a point at this depth. Returns `false` on overflow: the chunk is
  /// full and the point must descend to a child.
  pub fn accept(&self, point: &PointRecord) -> bool {
    debug_assert!(
      self.key.bounds.contains(point.position()),
      "point routed to chunk {} outside its bounds",
      self.key.dxyz
    );
    let mut points = self.points.lock();
    if points.len() >= CHUNK_CAPACITY {
      return false;
    }
    points.push(*point);
    drop(points);
    self.dirty.store(true, Ordering::Release);
    true
  }

  pub fn key(&self) -> &ChunkKey {
    &self.key
  }

  pub fn len(&self) -> usize {
    self.points.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.lock().is_empty()
  }

  /// Snapshot of the chunk's points.
  pub fn points(&self) -> Vec<PointRecord> {
    self.points.lock().clone()
  }

  /// True if the chunk has unserialized content.
  pub fn dirty(&self) -> bool {
    self.dirty.load(Ordering::Acquire)
  }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
