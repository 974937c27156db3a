//! Insertion and eviction throughput benchmarks.
//!
//! Measures the cache's hot path (insert into a resident chunk) and the
//! full eviction cycle (clip, purge to scratch, revive on re-insert),
//! both against in-memory endpoints so storage latency stays out of the
//! numbers.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chunk_cache::{
  Bounds, ChunkCache, ChunkKey, Clipper, Hierarchy, IoPool, MemEndpoint, PointRecord,
};

fn fresh_cache(cache_size: u64) -> ChunkCache {
  ChunkCache::new(
    Arc::new(Hierarchy::new()),
    Arc::new(IoPool::default()),
    Arc::new(MemEndpoint::new()),
    Arc::new(MemEndpoint::new()),
    cache_size,
    0,
  )
}

fn bench_resident_insert(c: &mut Criterion) {
  c.bench_function("insert_resident_chunk", |b| {
    let cache = fresh_cache(64);
    let ck = ChunkKey::root(Bounds::cube(100.0));
    let mut clipper = Clipper::new();
    let point = PointRecord::new([1.0, 2.0, 3.0], 50);

    b.iter(|| {
      // Overflow (full chunk) still exercises the whole lookup path.
      let stored = cache.insert(black_box(&point), &ck, &mut clipper).unwrap();
      black_box(stored)
    });
  });
}

fn bench_spread_inserts(c: &mut Criterion) {
  c.bench_function("insert_across_64_chunks", |b| {
    let cache = fresh_cache(64);
    let root = ChunkKey::root(Bounds::cube(100.0));
    let keys: Vec<ChunkKey> = (0..8u8)
      .flat_map(|a| (0..8u8).map(move |b| root.child(a).child(b)))
      .collect();
    let mut clipper = Clipper::new();
    let mut i = 0usize;

    b.iter(|| {
      let ck = &keys[i % keys.len()];
      i += 1;
      let mid = ck.bounds.mid();
      let point = PointRecord::new([mid.x, mid.y, mid.z], 1);
      black_box(cache.insert(&point, ck, &mut clipper).unwrap())
    });
  });
}

fn bench_evict_revive_cycle(c: &mut Criterion) {
  c.bench_function("evict_and_revive", |b| {
    let cache = fresh_cache(0); // zero budget: every clip pass evicts
    let ck = ChunkKey::root(Bounds::cube(100.0));
    let point = PointRecord::new([0.0, 0.0, 0.0], 1);

    b.iter(|| {
      let mut clipper = Clipper::new();
      cache.insert(&point, &ck, &mut clipper).unwrap();
      clipper.clip(&cache).unwrap();
      black_box(cache.resident())
    });
  });
}

criterion_group!(
  benches,
  bench_resident_insert,
  bench_spread_inserts,
  bench_evict_revive_cycle
);
criterion_main!(benches);
