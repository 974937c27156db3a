//! I/O execution service over rayon.
//!
//! Serialization during a purge is synchronous (its failure must reach the
//! caller of the purge-triggering operation), but full flushes write every
//! owned chunk and fan out across rayon's pool, with completions delivered
//! over a crossbeam channel.

use crossbeam_channel as channel;

/// Fan-out executor for batches of independent I/O jobs.
///
/// Note: rayon manages its own thread pool; the requested thread count is
/// advisory. Use `rayon::ThreadPoolBuilder` to configure the pool size
/// before first use if it matters.
pub struct IoPool {
  _threads: usize,
}

impl IoPool {
  pub fn new(threads: usize) -> Self {
    Self { _threads: threads }
  }

  /// Number of worker threads in rayon's pool.
  pub fn num_threads(&self) -> usize {
    rayon::current_num_threads()
  }

  /// Run every job on the pool and block until all results are in.
  ///
  /// Result order is completion order, not submission order; callers treat
  /// the batch as a set.
  pub fn run_all<T>(&self, jobs: Vec<Box<dyn FnOnce() -> T + Send>>) -> Vec<T>
  where
    T: Send + 'static,
  {
    let count = jobs.len();
    let (tx, rx) = channel::bounded(count);

    for job in jobs {
      let tx = tx.clone();
      rayon::spawn(move || {
        let _ = tx.send(job());
      });
    }
    drop(tx);

    rx.iter().take(count).collect()
  }
}

impl Default for IoPool {
  fn default() -> Self {
    Self::new(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_run_all_returns_every_result() {
    let pool = IoPool::default();

    let jobs: Vec<Box<dyn FnOnce() -> u64 + Send>> = (0..16u64)
      .map(|i| Box::new(move || i * i) as Box<dyn FnOnce() -> u64 + Send>)
      .collect();

    let mut results = pool.run_all(jobs);
    results.sort_unstable();
    let expected: Vec<u64> = (0..16u64).map(|i| i * i).collect();
    assert_eq!(results, expected);
  }

  #[test]
  fn test_run_all_empty_batch() {
    let pool = IoPool::new(4);
    let results: Vec<()> = pool.run_all(Vec::new());
    assert!(results.is_empty());
  }

  #[test]
  fn test_pool_reports_threads() {
    let pool = IoPool::default();
    assert!(pool.num_threads() >= 1);
  }
}
