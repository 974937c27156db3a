use super::*;
use std::sync::Arc;

#[test]
fn test_guard_releases_on_drop() {
  let lock = SpinLock::new();

  {
    let _guard = lock.guard();
    assert!(!lock.try_acquire());
  }

  assert!(lock.try_acquire());
  lock.release();
}

#[test]
fn test_try_acquire_contended() {
  let lock = SpinLock::new();
  lock.acquire();
  assert!(!lock.try_acquire());
  lock.release();
  assert!(lock.try_acquire());
  lock.release();
}

#[test]
fn test_mutex_serializes_increments() {
  let counter = Arc::new(SpinMutex::new(0u64));
  let threads = 8;
  let per_thread = 10_000;

  std::thread::scope(|s| {
    for _ in 0..threads {
      let counter = Arc::clone(&counter);
      s.spawn(move || {
        for _ in 0..per_thread {
          *counter.lock() += 1;
        }
      });
    }
  });

  assert_eq!(*counter.lock(), threads * per_thread);
}

#[test]
fn test_mutex_into_inner() {
  let mutex = SpinMutex::new(vec![1, 2, 3]);
  mutex.lock().push(4);
  assert_eq!(mutex.into_inner(), vec![1, 2, 3, 4]);
}
