//! labelcache: persistent interning of time-series label sets.
//!
//! A label set (an ordered list of name/value pairs) is mapped to a dense,
//! permanent 64-bit global ID. The mapping is persisted in a single ordered
//! key-value store, split into prefix namespaces ("buckets"), and fronted by
//! two in-memory LRU caches. Independent producers can additionally link
//! their own local reference IDs to the shared global numbering.
//!
//! # Architecture
//!
//! ```text
//!                  +-------------------------------+
//!                  |          LabelCache           |
//!                  |  RwLock  |  IdAllocator(lock) |
//!                  +----+-------------+------------+
//!                       |             |
//!          +------------+--+      +---+-------------+
//!          | FrontCache    |      | FrontCache      |
//!          | labels -> id  |      | id -> labels    |
//!          +---------------+      +-----------------+
//!                       | miss
//!                       v
//!   +--------+--------+--------+--------+--------+--------+
//!   | 1: rw  | 2: l->i| 3: i->l| 4: ttl | 5: c+l | 6: c+g |   Buckets
//!   +--------+--------+--------+--------+--------+--------+
//!                       |
//!                       v
//!              +-----------------+
//!              |  Store (fjall)  |
//!              +-----------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use labelcache::{Arena, FrontCacheConfig, LabelCache, LabelSet, StorageConfig};
//!
//! let storage = StorageConfig::new().directory("/var/lib/labelcache");
//! let cache = LabelCache::open(&storage, &FrontCacheConfig::default())?;
//!
//! let series = LabelSet::from_pairs([("__name__", "up"), ("job", "node")]);
//! let id = cache.get_or_add_global_ref_id(&series)?;
//!
//! let arena = Arena::new();
//! let found = cache.get_labels(&[id], &arena)?;
//! assert_eq!(found[0].as_ref(), Some(&series));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod labels;

pub mod allocator;
pub mod arena;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod front;
pub mod logging;
pub mod metrics;
pub mod store;

mod cache;

pub use arena::Arena;
pub use cache::{CacheStats, LabelCache};
pub use config::{
    Config, ConfigError, FrontCacheConfig, LogFormat, LoggingConfig, StorageConfig, SyncMode,
};
pub use error::{Error, Result};
pub use labels::{Label, LabelSet};
pub use store::{FjallStore, MemoryStore, Store};
