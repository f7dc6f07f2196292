//! write-buffering overlay
//!
//! reads fall through to the parent, writes stay in the overlay until
//! `commit`. dropping the cache without committing discards every write.

use super::{KvStore, WriteBatch};
use crate::error::Result;
use std::collections::BTreeMap;

pub struct CacheStore<'p> {
    parent: &'p mut (dyn KvStore + 'p),
    /// `None` marks a pending delete
    overlay: WriteBatch,
}

impl<'p> CacheStore<'p> {
    pub fn new(parent: &'p mut (dyn KvStore + 'p)) -> Self {
        Self {
            parent,
            overlay: BTreeMap::new(),
        }
    }

    /// Number of buffered writes and deletes
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Hand the buffered writes to the parent as one batch.
    pub fn commit(self) -> Result<()> {
        let CacheStore { parent, overlay } = self;
        if overlay.is_empty() {
            return Ok(());
        }
        parent.write_batch(overlay)
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            Some(v) => Ok(v.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.overlay.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.overlay.insert(key.to_vec(), None);
        Ok(())
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        self.overlay.extend(batch);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_scan(prefix)?.into_iter().collect();
        for (k, v) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match v {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_writes_invisible_until_commit() {
        let mut base = MemoryStore::new();
        base.set(b"a/1", b"one".to_vec()).unwrap();

        {
            let mut cache = CacheStore::new(&mut base);
            cache.set(b"a/2", b"two".to_vec()).unwrap();
            cache.delete(b"a/1").unwrap();

            let scan = cache.prefix_scan(b"a/").unwrap();
            assert_eq!(scan, vec![(b"a/2".to_vec(), b"two".to_vec())]);
            // dropped without commit
        }
        assert_eq!(base.get(b"a/1").unwrap(), Some(b"one".to_vec()));
        assert_eq!(base.get(b"a/2").unwrap(), None);
    }

    #[test]
    fn test_commit_applies_overlay() {
        let mut base = MemoryStore::new();
        base.set(b"a/1", b"one".to_vec()).unwrap();

        let mut cache = CacheStore::new(&mut base);
        cache.set(b"a/2", b"two".to_vec()).unwrap();
        cache.delete(b"a/1").unwrap();
        assert_eq!(cache.pending(), 2);
        cache.commit().unwrap();

        assert_eq!(base.get(b"a/1").unwrap(), None);
        assert_eq!(base.get(b"a/2").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_nested_caches() {
        let mut base = MemoryStore::new();
        let mut outer = CacheStore::new(&mut base);
        outer.set(b"x", b"1".to_vec()).unwrap();
        {
            let mut inner = CacheStore::new(&mut outer);
            assert_eq!(inner.get(b"x").unwrap(), Some(b"1".to_vec()));
            inner.set(b"y", b"2".to_vec()).unwrap();
            inner.commit().unwrap();
        }
        outer.commit().unwrap();
        assert_eq!(base.len(), 2);
    }
}
