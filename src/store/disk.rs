//! Durable store on top of the fjall LSM engine.

use super::Store;
use crate::config::{StorageConfig, SyncMode};
use crate::error::Result;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::info;

/// Name of the single partition holding every bucket.
const PARTITION: &str = "labels";

/// Persisted store backed by one fjall partition.
///
/// All buckets share the partition and are separated by their one-byte key
/// prefix.
pub struct FjallStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    sync_mode: SyncMode,
}

impl FjallStore {
    /// Open (or create) the store under `config.path()`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let path = config.path();
        std::fs::create_dir_all(&path)?;

        let mut fjall_config = fjall::Config::new(&path);
        if config.sync_mode.is_async() {
            fjall_config = fjall_config.fsync_ms(Some(config.fsync_ms));
        }
        let keyspace = fjall_config.open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;

        info!(
            path = %path.display(),
            sync_mode = ?config.sync_mode,
            "Opened label store"
        );

        Ok(Self {
            keyspace,
            partition,
            sync_mode: config.sync_mode,
        })
    }
}

impl Store for FjallStore {
    type Value = fjall::Slice;

    fn get(&self, key: &[u8]) -> Result<Option<Self::Value>> {
        Ok(self.partition.get(key)?)
    }

    fn batch_set(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Without an explicit mode the batch lands in the journal buffer and
        // is flushed by the OS (or the background fsync in async mode).
        let mut batch = self.keyspace.batch();
        if self.sync_mode.is_sync() {
            batch = batch.durability(Some(PersistMode::SyncAll));
        }
        for (key, value) in entries {
            batch.insert(&self.partition, *key, *value);
        }
        batch.commit()?;
        Ok(())
    }

    fn scan(
        &self,
        lower: &[u8],
        upper: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]),
    ) -> Result<()> {
        for item in self.partition.range(lower.to_vec()..upper.to_vec()) {
            let (key, value) = item?;
            visit(&key, &value);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &std::path::Path, sync_mode: SyncMode) -> FjallStore {
        let config = StorageConfig::new().directory(dir).sync_mode(sync_mode);
        FjallStore::open(&config).expect("failed to open store")
    }

    #[test]
    fn test_get_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), SyncMode::None);
        assert!(store.get(b"missing").unwrap().is_none());
    }

    #[test]
    fn test_batch_set_and_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), SyncMode::Sync);
        store
            .batch_set(&[
                (&b"\x02a"[..], &b"1"[..]),
                (&b"\x02b"[..], &b"2"[..]),
                (&b"\x03a"[..], &b"3"[..]),
            ])
            .unwrap();

        assert_eq!(store.get(b"\x02b").unwrap().as_deref(), Some(&b"2"[..]));

        let mut seen = Vec::new();
        store
            .scan(b"\x02", b"\x03", &mut |k, v| seen.push((k.to_vec(), v.to_vec())))
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (b"\x02a".to_vec(), b"1".to_vec()),
                (b"\x02b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(dir.path(), SyncMode::None);
            store.batch_set(&[(&b"k"[..], &b"v"[..])]).unwrap();
            store.persist().unwrap();
        }
        let store = open(dir.path(), SyncMode::None);
        assert_eq!(store.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
    }
}
