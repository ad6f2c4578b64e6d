//! Concurrency tests for LabelCache.
//!
//! Many threads intern overlapping label sets; every thread must observe
//! the same id for the same label set and ids must never be reused.

use labelcache::{Arena, FrontCacheConfig, LabelCache, LabelSet, MemoryStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const SERIES: usize = 500;

fn series(i: usize) -> LabelSet {
    LabelSet::from_pairs([("__name__", "requests"), ("instance", format!("host-{i}").as_str())])
}

fn shared_cache() -> Arc<LabelCache<MemoryStore>> {
    // A small front cache forces most lookups through the store.
    let front = FrontCacheConfig::new().initial_capacity(16).max_capacity(64);
    Arc::new(LabelCache::with_store(MemoryStore::new(), &front).expect("Failed to create cache"))
}

#[test]
fn test_concurrent_interning_agrees() {
    let cache = shared_cache();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                let arena = Arena::new();
                let mut seen = HashMap::new();
                // Each thread walks the series in a different order.
                for step in 0..SERIES {
                    let i = (step * (t + 1) + t) % SERIES;
                    let ids = cache
                        .write_labels(&[series(i)], Duration::ZERO, &arena)
                        .expect("write_labels failed");
                    seen.insert(i, ids[0]);
                }
                seen
            })
        })
        .collect();

    let mut agreed: HashMap<usize, u64> = HashMap::new();
    for handle in handles {
        for (i, id) in handle.join().expect("thread panicked") {
            let prev = *agreed.entry(i).or_insert(id);
            assert_eq!(prev, id, "series {i} got two ids");
        }
    }

    let unique: HashSet<u64> = agreed.values().copied().collect();
    assert_eq!(unique.len(), agreed.len(), "an id was reused");
    assert!(unique.iter().all(|&id| id >= 2));
    assert!(cache.current_id() as usize <= SERIES + 1);
}

#[test]
fn test_concurrent_links() {
    let cache = shared_cache();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                let component = format!("component-{t}");
                (0..100u64)
                    .map(|local| {
                        let global = cache
                            .get_or_add_link(&component, local + 1, &series(local as usize))
                            .expect("link failed");
                        (local, global)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut by_local: HashMap<u64, u64> = HashMap::new();
    for (t, handle) in handles.into_iter().enumerate() {
        let component = format!("component-{t}");
        for (local, global) in handle.join().expect("thread panicked") {
            // Same label set, so every component links to the same global id.
            let prev = *by_local.entry(local).or_insert(global);
            assert_eq!(prev, global);
            assert_eq!(cache.get_global_ref_id(&component, local + 1).unwrap(), global);
            assert_eq!(cache.get_local_ref_id(&component, global).unwrap(), local + 1);
        }
    }
}

#[test]
fn test_readers_during_writes() {
    let cache = shared_cache();
    let arena = Arena::new();
    let batch: Vec<LabelSet> = (0..SERIES).map(series).collect();
    let ids = cache
        .write_labels(&batch, Duration::ZERO, &arena)
        .expect("write_labels failed");
    let ids = Arc::new(ids);

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            let arena = Arena::new();
            for i in SERIES..SERIES * 2 {
                cache
                    .get_ids(&[series(i)], &arena)
                    .expect("get_ids failed");
            }
        })
    };

    let readers: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                let arena = Arena::new();
                let found = cache.get_labels(&ids, &arena).expect("get_labels failed");
                for (i, labels) in found.into_iter().enumerate() {
                    assert_eq!(labels, Some(series(i)));
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert_eq!(cache.current_id() as usize, SERIES * 2 + 1);
}
