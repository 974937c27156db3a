//! Busy-wait mutual exclusion for very short critical sections.
//!
//! Every critical section in this crate guarded by a spin lock is an O(1) or
//! O(log n) map or counter operation. Blocking storage I/O runs while holding
//! a chunk's *slot* lock only, never a slice lock, so unrelated chunks stay
//! contention-free during eviction and revival.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw test-and-set spin lock.
pub struct SpinLock {
  locked: AtomicBool,
}

impl SpinLock {
  pub const fn new() -> Self {
    Self {
      locked: AtomicBool::new(false),
    }
  }

  /// Acquire the lock, busy-waiting until it is free.
  pub fn acquire(&self) {
    while self
      .locked
      .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
      .is_err()
    {
      // Spin on a plain load to keep the cache line shared between waiters.
      while self.locked.load(Ordering::Relaxed) {
        std::hint::spin_loop();
      }
    }
  }

  /// Acquire without waiting. Returns `true` on success.
  pub fn try_acquire(&self) -> bool {
    self
      .locked
      .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
      .is_ok()
  }

  /// Release the lock. Caller must currently hold it.
  pub fn release(&self) {
    self.locked.store(false, Ordering::Release);
  }

  /// RAII acquisition.
  pub fn guard(&self) -> SpinGuard<'_> {
    self.acquire();
    SpinGuard { lock: self }
  }
}

impl Default for SpinLock {
  fn default() -> Self {
    Self::new()
  }
}

/// Scoped hold of a [`SpinLock`], released on drop.
pub struct SpinGuard<'a> {
  lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
  fn drop(&mut self) {
    self.lock.release();
  }
}

/// Data guarded by a [`SpinLock`].
pub struct SpinMutex<T> {
  lock: SpinLock,
  value: UnsafeCell<T>,
}

// Safety: access to `value` is serialized by `lock`.
unsafe impl<T: Send> Sync for SpinMutex<T> {}
unsafe impl<T: Send> Send for SpinMutex<T> {}

impl<T> SpinMutex<T> {
  pub const fn new(value: T) -> Self {
    Self {
      lock: SpinLock::new(),
      value: UnsafeCell::new(value),
    }
  }

  /// Acquire the lock and return a guard dereferencing to the value.
  pub fn lock(&self) -> SpinMutexGuard<'_, T> {
    self.lock.acquire();
    SpinMutexGuard { mutex: self }
  }

  /// Consume the mutex, returning the inner value.
  pub fn into_inner(self) -> T {
    self.value.into_inner()
  }
}

impl<T: Default> Default for SpinMutex<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

/// Scoped hold of a [`SpinMutex`], released on drop.
pub struct SpinMutexGuard<'a, T> {
  mutex: &'a SpinMutex<T>,
}

impl<T> Deref for SpinMutexGuard<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    // Safety: the lock is held for the guard's lifetime.
    unsafe { &*self.mutex.value.get() }
  }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
  fn deref_mut(&mut self) -> &mut T {
    // Safety: the lock is held for the guard's lifetime.
    unsafe { &mut *self.mutex.value.get() }
  }
}

impl<T> Drop for SpinMutexGuard<'_, T> {
  fn drop(&mut self) {
    self.mutex.lock.release();
  }
}

#[cfg(test)]
#[path = "spin_test.rs"]
mod spin_test;
