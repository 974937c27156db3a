//! chunk_cache - Out-of-core chunk caching for point cloud octree indexing
//!
//! This crate manages the in-memory residency, reference-counted lifetime,
//! and durable persistence of the nodes of a sparse octree index too large
//! to hold in memory. Under concurrent insertion load it decides which
//! chunks stay resident, serializes zero-reference chunks to a two-tier
//! storage backend (scratch during the build, durable at save), and revives
//! them on demand.
//!
//! # Features
//!
//! - **Sharded concurrency**: 64 spin-locked cache slices selected by chunk
//!   depth, with per-slot locks so storage I/O never stalls unrelated chunks
//! - **Reference-counted residency**: traversal-scoped [`Clipper`] holds pin
//!   chunks against eviction; eviction considers only zero-reference slots
//! - **Bounded memory**: a resident-chunk budget enforced by purge passes
//!   that serialize and free idle chunks
//! - **Two-tier persistence**: scratch endpoint absorbs mid-build evictions,
//!   a full flush promotes everything to durable storage
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chunk_cache::{
//!   Bounds, Clipper, DirEndpoint, IoPool, PointRecord, Registry,
//! };
//!
//! let registry = Registry::new(
//!   Bounds::cube(1000.0),
//!   Arc::new(IoPool::default()),
//!   Arc::new(DirEndpoint::new("./out")),
//!   Arc::new(DirEndpoint::new("./tmp")),
//!   64, // resident chunk budget
//!   0,  // no depth limit
//! );
//!
//! let mut clipper = Clipper::new();
//! let point = PointRecord::new([1.0, 2.0, 3.0], 87);
//!
//! // Descend from the root until a chunk accepts the point.
//! let mut ck = registry.root_key();
//! while !registry.add_point(&point, &ck, &mut clipper)? {
//!   ck = ck.step(point.position());
//! }
//!
//! // Release the traversal's holds and enforce the budget.
//! clipper.clip(registry.cache())?;
//!
//! registry.save(0)?;
//! # Ok::<(), chunk_cache::CacheError>(())
//! ```

pub mod error;
pub mod key;
pub mod spin;

// Re-export commonly used items
pub use error::CacheError;
pub use key::{slice_index, Bounds, ChunkKey, Dxyz, Xyz, SLICE_COUNT};
pub use spin::{SpinGuard, SpinLock, SpinMutex, SpinMutexGuard};

// Storage endpoints (durable out / scratch tmp)
pub mod endpoint;
pub use endpoint::{DirEndpoint, Endpoint, MemEndpoint};

// Per-identity point counts
pub mod hierarchy;
pub use hierarchy::Hierarchy;

// The octree node: point storage and overflow policy
pub mod chunk;
pub use chunk::{Chunk, PointRecord, CHUNK_CAPACITY};

// Traversal-scoped reference holder
pub mod clipper;
pub use clipper::Clipper;

// The sharded, bounded, concurrent cache
pub mod cache;
pub use cache::{ChunkCache, Info, ReffedChunk, DEFAULT_CACHE_SIZE};

// Per-index owner
pub mod registry;
pub use registry::Registry;

// I/O execution service over rayon
pub mod threading;
pub use threading::IoPool;
