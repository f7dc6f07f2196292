//! persistent store backed by sled

use super::{KvStore, WriteBatch};
use crate::error::Result;
use std::path::Path;
use tracing::info;

pub struct SledStore {
    tree: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        info!("opening sled store at {}", path.as_ref().display());
        let tree = sled::open(path)?;
        Ok(Self { tree })
    }

    /// Block until everything written so far is on disk.
    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    /// One `sled::Batch`, so a step lands on disk entirely or not at all.
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch {
            match value {
                Some(v) => sled_batch.insert(key, v),
                None => sled_batch.remove(key),
            }
        }
        self.tree.apply_batch(sled_batch)?;
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(prefix) {
            let (k, v) = item?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheStore;

    #[test]
    fn test_sled_roundtrip_and_scan_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path().join("db")).unwrap();

        store.set(b"g/\x00\x02", b"b".to_vec()).unwrap();
        store.set(b"g/\x00\x01", b"a".to_vec()).unwrap();
        store.set(b"h/\x00\x01", b"z".to_vec()).unwrap();

        let scan = store.prefix_scan(b"g/").unwrap();
        assert_eq!(scan.len(), 2);
        assert_eq!(scan[0].1, b"a".to_vec());

        store.delete(b"g/\x00\x01").unwrap();
        assert!(!store.has(b"g/\x00\x01").unwrap());
        store.flush().unwrap();
    }

    #[test]
    fn test_cache_commit_lands_as_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path().join("db")).unwrap();
        store.set(b"a/1", b"one".to_vec()).unwrap();

        let mut cache = CacheStore::new(&mut store);
        cache.set(b"a/2", b"two".to_vec()).unwrap();
        cache.set(b"a/3", b"three".to_vec()).unwrap();
        cache.delete(b"a/1").unwrap();
        cache.commit().unwrap();

        let scan = store.prefix_scan(b"a/").unwrap();
        assert_eq!(
            scan,
            vec![
                (b"a/2".to_vec(), b"two".to_vec()),
                (b"a/3".to_vec(), b"three".to_vec()),
            ]
        );

        // an empty batch is a no-op
        store.write_batch(WriteBatch::new()).unwrap();
        assert_eq!(store.prefix_scan(b"a/").unwrap().len(), 2);
    }
}
