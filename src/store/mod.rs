//! Ordered byte-key stores backing the label cache.
//!
//! The cache needs very little from its persisted store: point reads, atomic
//! batched writes, and a forward scan over a bounded key range. [`Store`]
//! captures exactly that, so buckets can run over the durable
//! [`FjallStore`] in production and the [`MemoryStore`] in tests.

mod disk;
mod memory;

pub use self::disk::FjallStore;
pub use self::memory::MemoryStore;

use crate::error::Result;

/// Minimal ordered key-value store contract.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the cache calls into the store
/// from many threads and relies on the store for its own internal locking.
pub trait Store: Send + Sync {
    /// Owned value handle returned by [`get`](Store::get).
    type Value: AsRef<[u8]>;

    /// Read a single key. Absent keys are `Ok(None)`.
    fn get(&self, key: &[u8]) -> Result<Option<Self::Value>>;

    /// Apply all `(key, value)` pairs as one atomic batch.
    fn batch_set(&self, entries: &[(&[u8], &[u8])]) -> Result<()>;

    /// Visit every entry with `lower <= key < upper`, in ascending key order.
    fn scan(
        &self,
        lower: &[u8],
        upper: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]),
    ) -> Result<()>;

    /// Make every committed batch durable.
    fn persist(&self) -> Result<()>;
}
