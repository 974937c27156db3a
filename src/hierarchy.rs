//! Per-chunk point counts for the whole tree.
//!
//! The hierarchy records how many points each chunk identity holds. Chunks
//! consult it on construction (to size their buffers on revival) and write
//! their count back when serialized. The cache itself never mutates it
//! directly.

use std::collections::BTreeMap;

use crate::endpoint::Endpoint;
use crate::error::CacheError;
use crate::key::Dxyz;
use crate::spin::SpinMutex;

/// Concurrent map of chunk identity to point count.
#[derive(Default)]
pub struct Hierarchy {
  counts: SpinMutex<BTreeMap<Dxyz, u64>>,
}

impl Hierarchy {
  pub fn new() -> Self {
    Self::default()
  }

  /// Recorded point count for an identity, zero if never written.
  pub fn get(&self, dxyz: Dxyz) -> u64 {
    self.counts.lock().get(&dxyz).copied().unwrap_or(0)
  }

  /// Record the point count for an identity.
  pub fn set(&self, dxyz: Dxyz, count: u64) {
    self.counts.lock().insert(dxyz, count);
  }

  /// Number of identities with a recorded count.
  pub fn len(&self) -> usize {
    self.counts.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.lock().is_empty()
  }

  /// Persist counts to an endpoint as JSON, one object per depth band.
  ///
  /// `step` is the band width: counts for depths `[band, band + step)` land
  /// in `hierarchy/{band}.json`. Step 0 writes a single object.
  pub fn save(&self, endpoint: &dyn Endpoint, step: u64) -> Result<(), CacheError> {
    let mut bands: BTreeMap<u64, BTreeMap<String, u64>> = BTreeMap::new();
    {
      let counts = self.counts.lock();
      for (dxyz, n) in counts.iter() {
        let band = if step == 0 { 0 } else { dxyz.depth - dxyz.depth % step };
        bands.entry(band).or_default().insert(dxyz.to_string(), *n);
      }
    }

    for (band, entries) in &bands {
      let bytes = serde_json::to_vec(entries)?;
      endpoint.put(&format!("hierarchy/{band}.json"), &bytes)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::endpoint::MemEndpoint;

  #[test]
  fn test_get_defaults_to_zero() {
    let h = Hierarchy::new();
    assert_eq!(h.get(Dxyz::new(1, 0, 0, 0)), 0);
    assert!(h.is_empty());
  }

  #[test]
  fn test_set_then_get() {
    let h = Hierarchy::new();
    let dxyz = Dxyz::new(2, 1, 0, 3);

    h.set(dxyz, 42);
    assert_eq!(h.get(dxyz), 42);

    h.set(dxyz, 50);
    assert_eq!(h.get(dxyz), 50);
    assert_eq!(h.len(), 1);
  }

  #[test]
  fn test_save_single_band() {
    let h = Hierarchy::new();
    h.set(Dxyz::new(0, 0, 0, 0), 10);
    h.set(Dxyz::new(3, 1, 1, 1), 5);

    let ep = MemEndpoint::new();
    h.save(&ep, 0).unwrap();

    let bytes = ep.get("hierarchy/0.json").unwrap();
    let entries: BTreeMap<String, u64> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(entries["0-0-0-0"], 10);
    assert_eq!(entries["3-1-1-1"], 5);
  }

  #[test]
  fn test_save_stepped_bands() {
    let h = Hierarchy::new();
    h.set(Dxyz::new(0, 0, 0, 0), 1);
    h.set(Dxyz::new(1, 0, 0, 1), 2);
    h.set(Dxyz::new(2, 0, 1, 0), 3);
    h.set(Dxyz::new(5, 1, 1, 1), 4);

    let ep = MemEndpoint::new();
    h.save(&ep, 2).unwrap();

    assert!(ep.contains("hierarchy/0.json"));
    assert!(ep.contains("hierarchy/2.json"));
    assert!(ep.contains("hierarchy/4.json"));
    assert_eq!(ep.len(), 3);
  }
}
