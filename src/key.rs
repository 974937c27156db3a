//! Chunk addressing: coordinates, depth-qualified identity, and bounds.
//!
//! A chunk is identified by its integer coordinate among siblings at one
//! depth ([`Xyz`]) and, globally, by that coordinate qualified with its depth
//! ([`Dxyz`]). The [`ChunkKey`] callers hand to the cache carries the
//! identity plus the spatial bounds needed to construct the chunk lazily and
//! to route points to children on overflow.
//!
//! # Octant convention
//!
//! Children are numbered 0-7 where the bits select the upper half per axis:
//! - bit 0: X
//! - bit 1: Y
//! - bit 2: Z

use std::fmt;

use glam::DVec3;

/// Number of independently locked cache slices.
pub const SLICE_COUNT: usize = 64;

/// Map a chunk's depth to its cache slice.
///
/// Pure function: `depth % 64`. Chunks at different depths land in different
/// slices (until depth 64 wraps), so concurrent work at different tree levels
/// rarely contends on a slice lock.
#[inline]
pub fn slice_index(depth: u64) -> usize {
  (depth % SLICE_COUNT as u64) as usize
}

/// Integer coordinate of a chunk among siblings at one depth.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Xyz {
  pub x: u64,
  pub y: u64,
  pub z: u64,
}

impl Xyz {
  pub fn new(x: u64, y: u64, z: u64) -> Self {
    Self { x, y, z }
  }

  /// Coordinate of the child in the given octant, one depth down.
  pub fn child(&self, octant: u8) -> Self {
    Self {
      x: self.x * 2 + (octant & 1) as u64,
      y: self.y * 2 + ((octant >> 1) & 1) as u64,
      z: self.z * 2 + ((octant >> 2) & 1) as u64,
    }
  }
}

impl fmt::Display for Xyz {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}-{}", self.x, self.y, self.z)
  }
}

/// Depth-qualified coordinate: the globally unique identity of a chunk.
///
/// Its `Display` form (`depth-x-y-z`) doubles as the storage object naming
/// convention.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Dxyz {
  pub depth: u64,
  pub xyz: Xyz,
}

impl Dxyz {
  pub fn new(depth: u64, x: u64, y: u64, z: u64) -> Self {
    Self {
      depth,
      xyz: Xyz::new(x, y, z),
    }
  }
}

impl fmt::Display for Dxyz {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.depth, self.xyz)
  }
}

/// Axis-aligned bounding box in index space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
  pub min: DVec3,
  pub max: DVec3,
}

impl Bounds {
  pub fn new(min: DVec3, max: DVec3) -> Self {
    Self { min, max }
  }

  /// Cube spanning `[-radius, radius]` on all axes.
  pub fn cube(radius: f64) -> Self {
    Self {
      min: DVec3::splat(-radius),
      max: DVec3::splat(radius),
    }
  }

  #[inline]
  pub fn mid(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Half-open containment test: min-inclusive, max-exclusive.
  #[inline]
  pub fn contains(&self, p: DVec3) -> bool {
    p.x >= self.min.x
      && p.x < self.max.x
      && p.y >= self.min.y
      && p.y < self.max.y
      && p.z >= self.min.z
      && p.z < self.max.z
  }

  /// Bounds of the child octant.
  pub fn octant(&self, octant: u8) -> Self {
    let mid = self.mid();
    let pick = |bit: bool, lo: f64, hi: f64, m: f64| if bit { (m, hi) } else { (lo, m) };
    let (x0, x1) = pick(octant & 1 != 0, self.min.x, self.max.x, mid.x);
    let (y0, y1) = pick(octant & 2 != 0, self.min.y, self.max.y, mid.y);
    let (z0, z1) = pick(octant & 4 != 0, self.min.z, self.max.z, mid.z);
    Self {
      min: DVec3::new(x0, y0, z0),
      max: DVec3::new(x1, y1, z1),
    }
  }

  /// Octant of this box containing the given point.
  #[inline]
  pub fn octant_of(&self, p: DVec3) -> u8 {
    let mid = self.mid();
    (p.x >= mid.x) as u8 | ((p.y >= mid.y) as u8) << 1 | ((p.z >= mid.z) as u8) << 2
  }
}

/// Addressing handle for a chunk: identity plus the bounds needed to
/// construct it lazily and descend to children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkKey {
  pub dxyz: Dxyz,
  pub bounds: Bounds,
}

impl ChunkKey {
  /// Key of the tree root over the given index bounds.
  pub fn root(bounds: Bounds) -> Self {
    Self {
      dxyz: Dxyz::default(),
      bounds,
    }
  }

  /// Key of the child in the given octant, one depth down.
  pub fn child(&self, octant: u8) -> Self {
    Self {
      dxyz: Dxyz {
        depth: self.dxyz.depth + 1,
        xyz: self.dxyz.xyz.child(octant),
      },
      bounds: self.bounds.octant(octant),
    }
  }

  /// Key of the child whose bounds contain the given point.
  pub fn step(&self, p: DVec3) -> Self {
    self.child(self.bounds.octant_of(p))
  }

  /// Reconstruct the key for an identity by walking the octant path down
  /// from the root. Used when only a [`Dxyz`] survives, e.g. when merging
  /// another registry's serialized chunks.
  pub fn from_dxyz(root: Bounds, dxyz: Dxyz) -> Self {
    let mut key = Self::root(root);
    for level in 0..dxyz.depth {
      let shift = dxyz.depth - 1 - level;
      let octant = ((dxyz.xyz.x >> shift) & 1) as u8
        | (((dxyz.xyz.y >> shift) & 1) as u8) << 1
        | (((dxyz.xyz.z >> shift) & 1) as u8) << 2;
      key = key.child(octant);
    }
    key
  }

  #[inline]
  pub fn depth(&self) -> u64 {
    self.dxyz.depth
  }

  #[inline]
  pub fn xyz(&self) -> Xyz {
    self.dxyz.xyz
  }
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
