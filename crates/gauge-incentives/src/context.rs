//! Execution context for one state-transition step
//!
//! A `Context` bundles the store, the block time and the event buffer. Every
//! public operation runs through `Context::atomic`, so a failure anywhere in
//! the operation leaves the store exactly as it was.

use crate::error::Result;
use crate::events::Event;
use crate::store::{CacheStore, KvStore};
use chrono::{DateTime, Utc};

pub struct Context<'a> {
    store: &'a mut (dyn KvStore + 'a),
    block_time: DateTime<Utc>,
    events: Vec<Event>,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut (dyn KvStore + 'a), block_time: DateTime<Utc>) -> Self {
        Self {
            store,
            block_time,
            events: Vec::new(),
        }
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.block_time
    }

    pub fn set_block_time(&mut self, t: DateTime<Utc>) {
        self.block_time = t;
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        &mut *self.store
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take every buffered event, leaving the buffer empty.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Run `f` against a cached child context.
    ///
    /// Store writes and events of the child are committed only when `f`
    /// returns `Ok`; on `Err` they are discarded.
    pub fn atomic<T>(&mut self, f: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        let block_time = self.block_time;
        let mut cache = CacheStore::new(&mut *self.store);
        let (res, events) = {
            let mut child = Context::new(&mut cache, block_time);
            let res = f(&mut child);
            (res, child.events)
        };
        let value = res?;
        cache.commit()?;
        self.events.extend(events);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());

        let res: Result<()> = ctx.atomic(|c| {
            c.store_mut().set(b"k", b"v".to_vec())?;
            c.emit(Event::GaugeCreated { gauge_id: 1 });
            Err(Error::Validation("nope".into()))
        });
        assert!(res.is_err());
        assert!(ctx.events().is_empty());
        assert_eq!(ctx.store().get(b"k").unwrap(), None);
    }

    #[test]
    fn test_atomic_commits_on_success() {
        let mut store = MemoryStore::new();
        {
            let mut ctx = Context::new(&mut store, Utc::now());
            ctx.atomic(|c| {
                c.store_mut().set(b"k", b"v".to_vec())?;
                c.emit(Event::GaugeCreated { gauge_id: 1 });
                Ok(())
            })
            .unwrap();
            assert_eq!(ctx.drain_events().len(), 1);
        }
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_nested_failure_only_discards_inner() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());
        ctx.atomic(|outer| {
            outer.store_mut().set(b"outer", vec![1])?;
            let inner: Result<()> = outer.atomic(|inner| {
                inner.store_mut().set(b"inner", vec![2])?;
                Err(Error::Validation("inner".into()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();
        assert!(ctx.store().has(b"outer").unwrap());
        assert!(!ctx.store().has(b"inner").unwrap());
    }
}
