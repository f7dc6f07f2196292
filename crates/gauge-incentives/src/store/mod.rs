//! storage layer: ordered key-value stores plus typed record helpers
//!
//! every module owns a key prefix and encodes its records with bincode.
//! implementations:
//! - memory: BTreeMap, for tests and dry runs
//! - sled: persistent, used by the gauged binary
//! - cache: write-buffering overlay that makes a step atomic

mod cache;
mod memory;
#[cfg(feature = "sled")]
mod sled_store;

pub use cache::CacheStore;
pub use memory::MemoryStore;
#[cfg(feature = "sled")]
pub use sled_store::SledStore;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;

/// Buffered writes by key; `None` marks a delete
pub type WriteBatch = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Ordered key-value store
///
/// `prefix_scan` returns entries in ascending key order; every index in this
/// crate relies on that ordering.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply every write of `batch`. Persistent stores apply it atomically.
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        for (key, value) in batch {
            match value {
                Some(v) => self.set(&key, v)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// Decode a stored record. A record that does not decode means the store is corrupt.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(Error::from)
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(Error::from)
}

pub fn get_record<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn set_record<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> Result<()> {
    store.set(key, encode(value)?)
}

/// Key construction helpers
///
/// strings are length-prefixed so that no key is a prefix of a longer,
/// unrelated key; integers are big-endian so byte order equals numeric order.
pub mod keys {
    use super::*;

    /// Start a key under a module/record prefix.
    pub fn prefixed(prefix: &[u8]) -> Vec<u8> {
        prefix.to_vec()
    }

    /// Append `s` behind a u16 length. Longer strings cannot be keyed.
    pub fn push_str(key: &mut Vec<u8>, s: &str) -> Result<()> {
        let len = u16::try_from(s.len()).map_err(|_| {
            Error::Validation(format!("key segment of {} bytes exceeds {}", s.len(), u16::MAX))
        })?;
        key.extend_from_slice(&len.to_be_bytes());
        key.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn push_u64(key: &mut Vec<u8>, v: u64) {
        key.extend_from_slice(&v.to_be_bytes());
    }

    /// Millisecond timestamp with the sign bit flipped so pre-epoch times sort first.
    pub fn push_time(key: &mut Vec<u8>, t: &DateTime<Utc>) {
        let ms = t.timestamp_millis() as u64 ^ (1u64 << 63);
        key.extend_from_slice(&ms.to_be_bytes());
    }

    /// Read back a length-prefixed string at `offset`, returning it and the next offset.
    pub fn read_str(key: &[u8], offset: usize) -> Result<(String, usize)> {
        let len_bytes = key
            .get(offset..offset + 2)
            .ok_or_else(|| Error::Corrupted("truncated key".into()))?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let start = offset + 2;
        let raw = key
            .get(start..start + len)
            .ok_or_else(|| Error::Corrupted("truncated key".into()))?;
        let s = String::from_utf8(raw.to_vec())
            .map_err(|_| Error::Corrupted(format!("non-utf8 key segment {}", hex::encode(raw))))?;
        Ok((s, start + len))
    }

    pub fn read_u64(key: &[u8], offset: usize) -> Result<u64> {
        let raw = key
            .get(offset..offset + 8)
            .ok_or_else(|| Error::Corrupted("truncated key".into()))?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_keys_sort_chronologically() {
        let early = Utc.timestamp_millis_opt(-5_000).unwrap();
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        let late = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let enc = |t: &DateTime<Utc>| {
            let mut k = Vec::new();
            keys::push_time(&mut k, t);
            k
        };
        assert!(enc(&early) < enc(&epoch));
        assert!(enc(&epoch) < enc(&late));
    }

    #[test]
    fn test_str_roundtrip_in_composite_key() {
        let mut key = keys::prefixed(b"p/");
        keys::push_str(&mut key, "dym1voter").unwrap();
        keys::push_str(&mut key, "dymvaloper1").unwrap();
        let (a, next) = keys::read_str(&key, 2).unwrap();
        let (b, end) = keys::read_str(&key, next).unwrap();
        assert_eq!(a, "dym1voter");
        assert_eq!(b, "dymvaloper1");
        assert_eq!(end, key.len());
    }

    #[test]
    fn test_oversized_segment_is_rejected() {
        let mut key = keys::prefixed(b"p/");
        let long = "a".repeat(u16::MAX as usize + 1);
        let err = keys::push_str(&mut key, &long).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!err.is_fatal());
        assert_eq!(key, b"p/".to_vec());

        let max = "a".repeat(u16::MAX as usize);
        keys::push_str(&mut key, &max).unwrap();
        assert_eq!(keys::read_str(&key, 2).unwrap().0, max);
    }

    #[test]
    fn test_corrupt_record_is_fatal() {
        let mut store = MemoryStore::new();
        store.set(b"k", vec![0xff]).unwrap();
        let res: Result<Option<String>> = get_record(&store, b"k");
        assert!(res.unwrap_err().is_fatal());
    }
}
