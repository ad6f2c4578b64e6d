//! The label cache orchestrator.
//!
//! [`LabelCache`] composes the front caches, the buckets and the ID
//! allocator into the public interning API.
//!
//! # Locking
//!
//! - One `RwLock` owns the bucket tables. Lookups (`get_labels`,
//!   `get_global_ref_id`, `get_local_ref_id`, the fast path of
//!   `get_or_add_link`) share it; anything that may mint IDs or write links
//!   holds it exclusively for the whole call, which serializes all writes.
//! - The [`IdAllocator`] has its own lock around the counter.
//! - Front caches lock internally and may be used without the table lock.
//!
//! Front caches are filled only after the store batch commits, and every
//! front-cache miss is resolved against the store before an ID is minted.

use crate::allocator::IdAllocator;
use crate::arena::Arena;
use crate::bucket::{Bucket, Prefix, WriteBatch};
use crate::codec::{self, MAX_ID};
use crate::config::{FrontCacheConfig, StorageConfig};
use crate::error::Result;
use crate::front::FrontCache;
use crate::labels::LabelSet;
use crate::metrics::{
    FRONT_HITS, FRONT_MISSES, LABELSETS_CREATED, LINK_OVERWRITES, LINKS_CREATED, STORE_LOOKUPS,
};
use crate::store::{FjallStore, Store};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bucket tables guarded by the cache lock.
struct Tables<S> {
    store: Arc<S>,
    label_to_id: Bucket<S>,
    id_to_label: Bucket<S>,
    local_to_global: Bucket<S>,
    global_to_local: Bucket<S>,
}

impl<S: Store> Tables<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            label_to_id: Bucket::new(store.clone(), Prefix::LabelToId, "label to id"),
            id_to_label: Bucket::new(store.clone(), Prefix::IdToLabel, "id to label"),
            local_to_global: Bucket::new(
                store.clone(),
                Prefix::LocalToGlobal,
                "component + local id to global id",
            ),
            global_to_local: Bucket::new(
                store.clone(),
                Prefix::GlobalToLocal,
                "component + global id to local id",
            ),
            store,
        }
    }
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Most recently minted global ID.
    pub current_id: u64,
    /// Entries in the labels -> ID front cache.
    pub label_cache_len: usize,
    /// Capacity of the labels -> ID front cache.
    pub label_cache_capacity: usize,
    /// Entries in the ID -> labels front cache.
    pub id_cache_len: usize,
    /// Capacity of the ID -> labels front cache.
    pub id_cache_capacity: usize,
}

/// Persistent label set interning with local/global reference linking.
///
/// Safe to share across threads (wrap in `Arc`). Every operation is
/// synchronous and returns storage errors unchanged; nothing is retried.
pub struct LabelCache<S: Store = FjallStore> {
    tables: RwLock<Tables<S>>,
    ids: IdAllocator,
    label_to_id: FrontCache<Box<[u8]>, u64>,
    id_to_labels: FrontCache<u64, LabelSet>,
    headroom: usize,
}

impl LabelCache<FjallStore> {
    /// Open the durable cache under `storage.directory`.
    ///
    /// Failure here leaves nothing usable; callers should treat it as fatal.
    pub fn open(storage: &StorageConfig, front: &FrontCacheConfig) -> Result<Self> {
        Self::with_store(FjallStore::open(storage)?, front)
    }
}

impl<S: Store> LabelCache<S> {
    /// Build a cache over an already opened store, recovering the ID counter
    /// from it.
    pub fn with_store(store: S, front: &FrontCacheConfig) -> Result<Self> {
        let tables = Tables::new(Arc::new(store));
        let ids = IdAllocator::new(tables.id_to_label.newest_id()?);
        info!(current_id = ids.current(), "Recovered label id counter");

        Ok(Self {
            tables: RwLock::new(tables),
            ids,
            label_to_id: FrontCache::new(
                "label to id",
                front.initial_capacity,
                front.max_capacity,
            ),
            id_to_labels: FrontCache::new(
                "id to labels",
                front.initial_capacity,
                front.max_capacity,
            ),
            headroom: front.headroom.max(1),
        })
    }

    /// Intern a batch of label sets, returning their global IDs in order.
    ///
    /// Front-cache hits are answered directly; all misses are looked up in
    /// the store in one pass, and label sets still unknown get fresh IDs.
    /// The new label -> ID and ID -> label entries are committed as a single
    /// batch before any front cache is updated.
    ///
    /// `ttl` is accepted for interface compatibility but not enforced: no
    /// expiry is recorded and entries are never evicted from the store.
    pub fn write_labels(
        &self,
        batch: &[LabelSet],
        _ttl: Duration,
        arena: &Arena,
    ) -> Result<Vec<u64>> {
        let tables = self.tables.write();
        self.grow_front_caches(batch.len());
        self.resolve(&tables, batch, true, arena)
    }

    /// Like [`write_labels`](Self::write_labels) but always consults the
    /// store, bypassing the labels -> ID front cache for the lookup.
    pub fn get_ids(&self, batch: &[LabelSet], arena: &Arena) -> Result<Vec<u64>> {
        let tables = self.tables.write();
        self.grow_front_caches(batch.len());
        self.resolve(&tables, batch, false, arena)
    }

    /// Reverse lookup of label sets by global ID.
    ///
    /// Unknown IDs (including the reserved `0`) yield `None` in their slot.
    pub fn get_labels(&self, ids: &[u64], arena: &Arena) -> Result<Vec<Option<LabelSet>>> {
        let tables = self.tables.read();

        let mut found = vec![None; ids.len()];
        let mut misses = Vec::new();
        for (i, &id) in ids.iter().enumerate() {
            if id == 0 || id > MAX_ID {
                continue;
            }
            match self.id_to_labels.get(&id) {
                Some(labels) => {
                    FRONT_HITS.increment();
                    found[i] = Some(labels);
                }
                None => {
                    FRONT_MISSES.increment();
                    misses.push(i);
                }
            }
        }
        if misses.is_empty() {
            return Ok(found);
        }

        let mut keys = Vec::with_capacity(misses.len());
        for &i in &misses {
            keys.push(arena.alloc_copy(&codec::encode_id(ids[i])?)?);
        }
        let values = tables.id_to_label.get_values(&keys, arena)?;
        STORE_LOOKUPS.add(keys.len() as u64);

        for (&i, value) in misses.iter().zip(values) {
            let Some(bytes) = value else {
                continue;
            };
            let labels = codec::decode_labels(bytes)?;
            self.label_to_id.put(bytes.into(), ids[i]);
            self.id_to_labels.put(ids[i], labels.clone());
            found[i] = Some(labels);
        }
        Ok(found)
    }

    /// Link `(component, local_ref)` to the global ID of `labels`, creating
    /// the global ID if needed. Returns the linked global ID.
    ///
    /// An existing link is returned unchanged under the read lock. Otherwise
    /// the label set is resolved through [`get_ids`](Self::get_ids) and both
    /// link directions are committed together under the write lock.
    ///
    /// The read lock is released before the write lock is taken, so two
    /// callers racing on the same `(component, local_ref)` with different
    /// label sets both write; the last writer wins. Such overwrites are
    /// logged and counted in `labelcache_link_overwrites`.
    pub fn get_or_add_link(
        &self,
        component: &str,
        local_ref: u64,
        labels: &LabelSet,
    ) -> Result<u64> {
        let arena = Arena::new();
        let local_key = codec::encode_composite_key(component, local_ref, &arena)?;

        {
            let tables = self.tables.read();
            if let Some(field) = tables.local_to_global.get_value(local_key, &arena)? {
                return codec::decode_id(field);
            }
        }

        let global = self.get_ids(std::slice::from_ref(labels), &arena)?[0];
        let global_key = codec::encode_composite_key(component, global, &arena)?;
        let global_field = arena.alloc_copy(&codec::encode_id(global)?)?;
        let local_field = arena.alloc_copy(&codec::encode_id(local_ref)?)?;

        let tables = self.tables.write();
        if let Some(field) = tables.local_to_global.get_value(local_key, &arena)? {
            let previous = codec::decode_id(field)?;
            if previous != global {
                LINK_OVERWRITES.increment();
                warn!(
                    component,
                    local_ref, previous, global, "Concurrent link overwritten"
                );
            }
        }

        let mut batch = WriteBatch::new();
        tables
            .local_to_global
            .stage(&mut batch, &[local_key], &[global_field], &arena)?;
        tables
            .global_to_local
            .stage(&mut batch, &[global_key], &[local_field], &arena)?;
        batch.commit(&*tables.store)?;

        LINKS_CREATED.increment();
        debug!(component, local_ref, global, "Linked local reference");
        Ok(global)
    }

    /// Global ID for a single label set, creating it if needed.
    ///
    /// Checks the labels -> ID front cache first, then falls back to
    /// [`get_ids`](Self::get_ids).
    pub fn get_or_add_global_ref_id(&self, labels: &LabelSet) -> Result<u64> {
        let arena = Arena::new();
        let key = codec::encode_labels_in(labels, &arena)?;
        if let Some(id) = self.label_to_id.get(key) {
            FRONT_HITS.increment();
            return Ok(id);
        }
        FRONT_MISSES.increment();
        Ok(self.get_ids(std::slice::from_ref(labels), &arena)?[0])
    }

    /// Global ID linked to `(component, local_ref)`, or `0` if none.
    pub fn get_global_ref_id(&self, component: &str, local_ref: u64) -> Result<u64> {
        // IDs past MAX_ID have no storage encoding, so nothing can be linked.
        if local_ref > MAX_ID {
            return Ok(0);
        }
        let arena = Arena::new();
        let key = codec::encode_composite_key(component, local_ref, &arena)?;
        let tables = self.tables.read();
        match tables.local_to_global.get_value(key, &arena)? {
            Some(field) => codec::decode_id(field),
            None => Ok(0),
        }
    }

    /// Local reference ID that `component` linked to `global_ref`, or `0`
    /// if none.
    pub fn get_local_ref_id(&self, component: &str, global_ref: u64) -> Result<u64> {
        if global_ref > MAX_ID {
            return Ok(0);
        }
        let arena = Arena::new();
        let key = codec::encode_composite_key(component, global_ref, &arena)?;
        let tables = self.tables.read();
        match tables.global_to_local.get_value(key, &arena)? {
            Some(field) => codec::decode_id(field),
            None => Ok(0),
        }
    }

    /// Force everything committed so far to disk, whatever the sync mode.
    pub fn flush(&self) -> Result<()> {
        let tables = self.tables.read();
        tables.store.persist()?;
        info!(current_id = self.ids.current(), "Flushed label store");
        Ok(())
    }

    /// Most recently minted global ID.
    pub fn current_id(&self) -> u64 {
        self.ids.current()
    }

    /// Snapshot of the ID counter and front cache occupancy.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            current_id: self.ids.current(),
            label_cache_len: self.label_to_id.len(),
            label_cache_capacity: self.label_to_id.capacity(),
            id_cache_len: self.id_to_labels.len(),
            id_cache_capacity: self.id_to_labels.capacity(),
        }
    }

    fn grow_front_caches(&self, batch_len: usize) {
        self.label_to_id.grow_for_batch(batch_len, self.headroom);
        self.id_to_labels.grow_for_batch(batch_len, self.headroom);
    }

    /// Resolve-or-create for a batch. Caller holds the write lock.
    fn resolve<'a>(
        &self,
        tables: &Tables<S>,
        batch: &[LabelSet],
        use_front: bool,
        arena: &'a Arena,
    ) -> Result<Vec<u64>> {
        let mut encoded: Vec<&'a [u8]> = Vec::with_capacity(batch.len());
        for labels in batch {
            encoded.push(codec::encode_labels_in(labels, arena)?);
        }

        let mut ids = vec![0u64; batch.len()];
        let mut misses = Vec::new();
        for (i, key) in encoded.iter().enumerate() {
            if use_front {
                if let Some(id) = self.label_to_id.get(*key) {
                    FRONT_HITS.increment();
                    ids[i] = id;
                    continue;
                }
                FRONT_MISSES.increment();
            }
            misses.push(i);
        }
        if misses.is_empty() {
            return Ok(ids);
        }

        let miss_keys: Vec<&[u8]> = misses.iter().map(|&i| encoded[i]).collect();
        let stored = tables.label_to_id.get_values(&miss_keys, arena)?;
        STORE_LOOKUPS.add(miss_keys.len() as u64);

        // A label set repeated within the batch gets a single new ID.
        let mut minted: HashMap<&'a [u8], u64, ahash::RandomState> = HashMap::default();
        let mut writes = WriteBatch::new();
        for (&i, value) in misses.iter().zip(stored) {
            ids[i] = match value {
                Some(field) => codec::decode_id(field)?,
                None => match minted.get(encoded[i]).copied() {
                    Some(id) => id,
                    None => {
                        let id = self.ids.next_id()?;
                        let field = arena.alloc_copy(&codec::encode_id(id)?)?;
                        tables
                            .label_to_id
                            .stage(&mut writes, &[encoded[i]], &[field], arena)?;
                        tables
                            .id_to_label
                            .stage(&mut writes, &[field], &[encoded[i]], arena)?;
                        minted.insert(encoded[i], id);
                        id
                    }
                },
            };
        }

        if !writes.is_empty() {
            writes.commit(&*tables.store)?;
            LABELSETS_CREATED.add(minted.len() as u64);
            debug!(
                batch = batch.len(),
                created = minted.len(),
                current_id = self.ids.current(),
                "Interned new label sets"
            );
        }

        for &i in &misses {
            self.label_to_id.put(encoded[i].into(), ids[i]);
            self.id_to_labels.put(ids[i], batch[i].clone());
        }
        Ok(ids)
    }
}
