use super::*;
use crate::chunk::CHUNK_CAPACITY;
use crate::endpoint::MemEndpoint;

struct Rig {
  out: Arc<MemEndpoint>,
  registry: Registry,
}

fn rig(cache_size: u64) -> Rig {
  let out = Arc::new(MemEndpoint::new());
  let registry = Registry::new(
    Bounds::cube(8.0),
    Arc::new(IoPool::default()),
    out.clone(),
    Arc::new(MemEndpoint::new()),
    cache_size,
    0,
  );
  Rig { out, registry }
}

fn point(x: f64, y: f64, z: f64) -> PointRecord {
  PointRecord::new([x, y, z], 10)
}

#[test]
fn test_add_point_passes_through_to_cache() {
  let rig = rig(64);
  let mut clipper = Clipper::new();
  let ck = rig.registry.root_key();

  assert!(rig.registry.add_point(&point(1.0, 1.0, 1.0), &ck, &mut clipper).unwrap());
  assert_eq!(rig.registry.cache().resident(), 1);
  assert_eq!(rig.registry.cache().points_of(&ck.dxyz).unwrap().len(), 1);
}

#[test]
fn test_overflow_descends_one_level() {
  let rig = rig(64);
  let mut clipper = Clipper::new();
  let root = rig.registry.root_key();

  let p = point(2.0, 2.0, 2.0);
  for _ in 0..CHUNK_CAPACITY {
    assert!(rig.registry.add_point(&p, &root, &mut clipper).unwrap());
  }

  // Root is full: the point overflows and lands one level deeper.
  assert!(!rig.registry.add_point(&p, &root, &mut clipper).unwrap());
  let child = root.step(p.position());
  assert!(rig.registry.add_point(&p, &child, &mut clipper).unwrap());

  assert_eq!(rig.registry.cache().resident(), 2);
  assert_eq!(child.depth(), 1);
}

#[test]
fn test_save_persists_chunks_and_hierarchy() {
  let rig = rig(64);
  let mut clipper = Clipper::new();
  let root = rig.registry.root_key();

  for i in 0..4 {
    let p = point(i as f64 * 0.5, -1.0, 3.0);
    rig.registry.add_point(&p, &root, &mut clipper).unwrap();
  }

  rig.registry.save(0).unwrap();

  assert!(rig.out.contains("data/0-0-0-0"));
  assert!(rig.out.contains("hierarchy/0.json"));
  assert_eq!(rig.registry.hierarchy().get(root.dxyz), 4);
}

#[test]
fn test_merge_unions_resident_chunks() {
  let a = rig(64);
  let b = rig(64);
  let mut a_clipper = Clipper::new();
  let mut b_clipper = Clipper::new();
  let root = a.registry.root_key();

  a.registry.add_point(&point(1.0, 0.0, 0.0), &root, &mut a_clipper).unwrap();
  a.registry.add_point(&point(2.0, 0.0, 0.0), &root, &mut a_clipper).unwrap();
  b.registry.add_point(&point(-1.0, 0.0, 0.0), &root, &mut b_clipper).unwrap();

  let mut merge_clipper = Clipper::new();
  b.registry.merge(&a.registry, &mut merge_clipper).unwrap();

  // B's root now holds the union of both registries' points.
  let merged = b.registry.cache().points_of(&root.dxyz).unwrap();
  assert_eq!(merged.len(), 3);
  assert!(merge_clipper.is_empty());
}

#[test]
fn test_merge_reads_serialized_chunks() {
  let a = rig(0); // zero budget: A's chunks evict as soon as they unpin
  let b = rig(64);
  let root = a.registry.root_key();

  let mut clipper = Clipper::new();
  for i in 0..6 {
    let p = point(i as f64 * 0.25, 1.0, 1.0);
    a.registry.add_point(&p, &root, &mut clipper).unwrap();
  }
  clipper.clip(a.registry.cache()).unwrap();
  assert_eq!(a.registry.cache().resident(), 0);

  let mut merge_clipper = Clipper::new();
  b.registry.merge(&a.registry, &mut merge_clipper).unwrap();

  assert_eq!(b.registry.cache().points_of(&root.dxyz).unwrap().len(), 6);
}

#[test]
fn test_merge_descends_on_overflow() {
  let a = rig(64);
  let b = rig(64);
  let root = a.registry.root_key();
  let p = point(3.0, 3.0, 3.0);

  // Fill B's root ahead of the merge so A's point must descend.
  let mut a_clipper = Clipper::new();
  let mut b_clipper = Clipper::new();
  for _ in 0..CHUNK_CAPACITY {
    b.registry.add_point(&p, &root, &mut b_clipper).unwrap();
  }
  a.registry.add_point(&p, &root, &mut a_clipper).unwrap();

  let mut merge_clipper = Clipper::new();
  b.registry.merge(&a.registry, &mut merge_clipper).unwrap();

  let child = root.step(p.position());
  assert_eq!(b.registry.cache().points_of(&child.dxyz).unwrap().len(), 1);
}

#[test]
fn test_latch_info_via_registry() {
  let rig = rig(64);
  let mut clipper = Clipper::new();
  let root = rig.registry.root_key();
  rig.registry.add_point(&point(0.0, 0.0, 0.0), &root, &mut clipper).unwrap();

  let info = rig.registry.latch_info();
  assert_eq!(info.alive, 1);
  assert_eq!(rig.registry.latch_info(), Info::default());
}
