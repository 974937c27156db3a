use super::*;

#[test]
fn test_mem_put_get_roundtrip() {
  let ep = MemEndpoint::new();
  ep.put("data/0-0-0-0", b"abc").unwrap();

  assert_eq!(ep.get("data/0-0-0-0").unwrap(), b"abc");
  assert_eq!(ep.len(), 1);
  assert!(ep.contains("data/0-0-0-0"));
}

#[test]
fn test_mem_overwrite_replaces() {
  let ep = MemEndpoint::new();
  ep.put("k", b"one").unwrap();
  ep.put("k", b"two").unwrap();

  assert_eq!(ep.get("k").unwrap(), b"two");
  assert_eq!(ep.len(), 1);
}

#[test]
fn test_mem_missing_is_not_found() {
  let ep = MemEndpoint::new();
  match ep.get("absent") {
    Err(CacheError::NotFound { key }) => assert_eq!(key, "absent"),
    other => panic!("expected NotFound, got {other:?}"),
  }
}

#[test]
fn test_dir_put_get_roundtrip() {
  let dir = tempfile::tempdir().unwrap();
  let ep = DirEndpoint::new(dir.path());

  ep.put("data/3-1-2-4", &[1, 2, 3, 4]).unwrap();
  assert_eq!(ep.get("data/3-1-2-4").unwrap(), vec![1, 2, 3, 4]);

  // No partial file left behind.
  assert!(dir.path().join("data/3-1-2-4").exists());
  assert!(!dir.path().join("data/3-1-2-4.partial").exists());
}

#[test]
fn test_dir_missing_is_not_found() {
  let dir = tempfile::tempdir().unwrap();
  let ep = DirEndpoint::new(dir.path());

  assert!(matches!(
    ep.get("nope"),
    Err(CacheError::NotFound { .. })
  ));
}

#[test]
fn test_dir_creates_nested_dirs() {
  let dir = tempfile::tempdir().unwrap();
  let ep = DirEndpoint::new(dir.path());

  ep.put("a/b/c/object", b"x").unwrap();
  assert_eq!(ep.get("a/b/c/object").unwrap(), b"x");
}
