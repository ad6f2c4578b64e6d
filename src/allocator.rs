//! Monotonic global ID allocation.

use crate::codec::MAX_ID;
use crate::error::{Error, Result};
use crate::metrics::CURRENT_ID;
use parking_lot::Mutex;

/// Hands out dense, never-reused global IDs.
///
/// The counter is seeded from the newest ID found in the store and then
/// incremented under its own lock, separate from the cache lock, so minting
/// stays a short critical section. ID `0` is reserved for "not found" and the
/// first ID minted in an empty store is `2`.
#[derive(Debug)]
pub struct IdAllocator {
    current: Mutex<u64>,
}

impl IdAllocator {
    /// Create an allocator resuming after `recovered`, the newest persisted
    /// ID if any.
    pub fn new(recovered: Option<u64>) -> Self {
        let current = recovered.unwrap_or(0).max(1);
        CURRENT_ID.set(current as i64);
        Self {
            current: Mutex::new(current),
        }
    }

    /// The most recently minted (or recovered) ID.
    pub fn current(&self) -> u64 {
        *self.current.lock()
    }

    /// Mint the next ID.
    ///
    /// Fails with [`Error::IdOverflow`] once the 8-byte storage field is
    /// exhausted.
    pub fn next_id(&self) -> Result<u64> {
        let mut current = self.current.lock();
        if *current >= MAX_ID {
            return Err(Error::IdOverflow { id: *current + 1 });
        }
        *current += 1;
        CURRENT_ID.set(*current as i64);
        Ok(*current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_store_starts_at_two() {
        let ids = IdAllocator::new(None);
        assert_eq!(ids.current(), 1);
        assert_eq!(ids.next_id().unwrap(), 2);
        assert_eq!(ids.next_id().unwrap(), 3);
    }

    #[test]
    fn test_resumes_after_recovered() {
        let ids = IdAllocator::new(Some(41));
        assert_eq!(ids.next_id().unwrap(), 42);

        // A recovered zero is treated like an empty store.
        let ids = IdAllocator::new(Some(0));
        assert_eq!(ids.next_id().unwrap(), 2);
    }

    #[test]
    fn test_overflow() {
        let ids = IdAllocator::new(Some(MAX_ID - 1));
        assert_eq!(ids.next_id().unwrap(), MAX_ID);
        assert!(matches!(ids.next_id(), Err(Error::IdOverflow { .. })));
        assert_eq!(ids.current(), MAX_ID);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let ids = Arc::new(IdAllocator::new(None));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || (0..1000).map(|_| ids.next_id().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(ids.current(), 8001);
    }
}
