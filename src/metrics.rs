//! Label cache metrics.
//!
//! Exposed through the global `metriken` registry; any exporter that walks
//! `metriken::metrics()` picks these up.

use metriken::{Counter, Gauge, metric};

/// New label sets interned.
#[metric(
    name = "labelcache_labelsets_created",
    description = "Label sets assigned a new global id"
)]
pub static LABELSETS_CREATED: Counter = Counter::new();

/// Front cache hits.
#[metric(
    name = "labelcache_front_hits",
    description = "Lookups answered by a front cache"
)]
pub static FRONT_HITS: Counter = Counter::new();

/// Front cache misses.
#[metric(
    name = "labelcache_front_misses",
    description = "Lookups that missed the front caches"
)]
pub static FRONT_MISSES: Counter = Counter::new();

/// Persisted store reads.
#[metric(
    name = "labelcache_store_lookups",
    description = "Keys read from the persisted store"
)]
pub static STORE_LOOKUPS: Counter = Counter::new();

/// Links written.
#[metric(
    name = "labelcache_links_created",
    description = "Local to global reference links written"
)]
pub static LINKS_CREATED: Counter = Counter::new();

/// Links overwritten by a concurrent caller.
#[metric(
    name = "labelcache_link_overwrites",
    description = "Links that replaced a different global id"
)]
pub static LINK_OVERWRITES: Counter = Counter::new();

/// Last minted global id.
#[metric(
    name = "labelcache_current_id",
    description = "Most recently minted global id"
)]
pub static CURRENT_ID: Gauge = Gauge::new();
