//! Volatile in-memory store.

use super::Store;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered in-memory store with the same contract as the durable store.
///
/// Nothing survives a drop; used for tests and for caches that only need
/// process-lifetime interning.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all prefixes.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Store for MemoryStore {
    type Value = Vec<u8>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn batch_set(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        let mut map = self.map.write();
        for (key, value) in entries {
            map.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }

    fn scan(
        &self,
        lower: &[u8],
        upper: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]),
    ) -> Result<()> {
        let map = self.map.read();
        let range = map.range::<[u8], _>((Bound::Included(lower), Bound::Excluded(upper)));
        for (key, value) in range {
            visit(key, value);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        Ok(())
    }
}
