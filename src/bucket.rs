//! Prefix-partitioned tables inside one physical store.
//!
//! Every logical table of the cache is a [`Bucket`]: a one-byte key prefix
//! inside the shared [`Store`]. Keys handed to a bucket are remapped to
//! `[prefix] ++ key` in the caller's arena, so tables never collide and a
//! single store batch can span several of them.
//!
//! # Prefix assignment
//!
//! The assignment is part of the on-disk format and must not change:
//!
//! | Prefix | Table |
//! |---|---|
//! | 1 | remote-write mapping (reserved) |
//! | 2 | label bytes -> global ID |
//! | 3 | global ID -> label bytes |
//! | 4 | TTL index (reserved) |
//! | 5 | component + local ID -> global ID |
//! | 6 | component + global ID -> local ID |

use crate::arena::Arena;
use crate::codec;
use crate::error::{Error, Result};
use crate::store::Store;
use std::sync::Arc;
use tracing::debug;

/// Key prefix of a bucket.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// Legacy remote-write mapping. Reserved, never written.
    RemoteWrite = 1,
    /// Encoded label set to global ID.
    LabelToId = 2,
    /// Global ID to encoded label set.
    IdToLabel = 3,
    /// TTL index. Reserved, never written.
    TtlToId = 4,
    /// Component + local reference ID to global ID.
    LocalToGlobal = 5,
    /// Component + global ID to local reference ID.
    GlobalToLocal = 6,
}

impl Prefix {
    /// The prefix byte.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Writes staged across one or more buckets, committed as a single batch.
///
/// Keys are already prefixed. Both keys and values borrow from the arena
/// (or caller data) for `'a`.
#[derive(Debug, Default)]
pub struct WriteBatch<'a> {
    entries: Vec<(&'a [u8], &'a [u8])>,
}

impl<'a> WriteBatch<'a> {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every staged entry to `store` atomically.
    pub fn commit<S: Store + ?Sized>(self, store: &S) -> Result<()> {
        store.batch_set(&self.entries)
    }
}

/// A prefixed view over the shared store.
pub struct Bucket<S> {
    store: Arc<S>,
    prefix: Prefix,
    name: &'static str,
}

impl<S: Store> Bucket<S> {
    /// Create a bucket for `prefix` over `store`. `name` is used in logs.
    pub fn new(store: Arc<S>, prefix: Prefix, name: &'static str) -> Self {
        Self {
            store,
            prefix,
            name,
        }
    }

    fn prefixed<'a>(&self, key: &[u8], arena: &'a Arena) -> Result<&'a [u8]> {
        let buf = arena.alloc_bytes(key.len() + 1)?;
        buf[0] = self.prefix.as_byte();
        buf[1..].copy_from_slice(key);
        Ok(buf)
    }

    /// Stage `keys[i] -> values[i]` into `batch` without committing.
    ///
    /// Returns [`Error::LengthMismatch`] if the slices differ in length.
    pub fn stage<'a>(
        &self,
        batch: &mut WriteBatch<'a>,
        keys: &[&[u8]],
        values: &[&'a [u8]],
        arena: &'a Arena,
    ) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        batch.entries.reserve(keys.len());
        for (key, value) in keys.iter().zip(values) {
            batch.entries.push((self.prefixed(key, arena)?, *value));
        }
        Ok(())
    }

    /// Write `keys[i] -> values[i]` as one atomic batch.
    ///
    /// Durability follows the store's configured sync mode.
    pub fn write_values<'a>(
        &self,
        keys: &[&[u8]],
        values: &[&'a [u8]],
        arena: &'a Arena,
    ) -> Result<()> {
        let mut batch = WriteBatch::new();
        self.stage(&mut batch, keys, values, arena)?;
        batch.commit(&*self.store)
    }

    /// Look up each key. Absent keys yield `None`.
    ///
    /// Values are copied out of the store into `arena`.
    pub fn get_values<'a>(
        &self,
        keys: &[&[u8]],
        arena: &'a Arena,
    ) -> Result<Vec<Option<&'a [u8]>>> {
        keys.iter().map(|key| self.get_value(key, arena)).collect()
    }

    /// Look up a single key.
    pub fn get_value<'a>(&self, key: &[u8], arena: &'a Arena) -> Result<Option<&'a [u8]>> {
        let prefixed = self.prefixed(key, arena)?;
        match self.store.get(prefixed)? {
            Some(value) => Ok(Some(arena.alloc_copy(value.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Recover the greatest ID used as a key in this bucket.
    ///
    /// Keys are LEB128 varints, whose byte order differs from numeric order
    /// (256 encodes as `80 02` and sorts before 255's `ff 01`), so the whole
    /// `[prefix]..[prefix + 1]` range is scanned rather than seeking to the
    /// last key. Only meaningful for ID-keyed buckets.
    pub fn newest_id(&self) -> Result<Option<u64>> {
        let lower = [self.prefix.as_byte()];
        let upper = [self.prefix.as_byte() + 1];

        let mut newest: Option<u64> = None;
        let mut scanned = 0usize;
        let mut corrupted = false;
        self.store.scan(&lower, &upper, &mut |key, _| {
            scanned += 1;
            match codec::uvarint(&key[1..]) {
                Some((id, _)) => newest = newest.max(Some(id)),
                None => corrupted = true,
            }
        })?;

        if corrupted {
            return Err(Error::Corrupted("invalid id key"));
        }

        debug!(bucket = self.name, scanned, newest = ?newest, "Scanned for newest id");
        Ok(newest)
    }
}
