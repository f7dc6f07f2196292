//! Epoch clock
//!
//! Epochs are fixed-length periods identified by name ("day", "week"). The
//! tracker is ticked once per block; each tick advances at most one boundary
//! per epoch and notifies the registered hooks.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::{decode, get_record, keys, set_record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const EPOCH_PREFIX: &[u8] = b"epochs/info/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub identifier: String,

    /// Length of one epoch
    pub duration: Duration,

    /// First epoch begins here
    pub start_time: DateTime<Utc>,

    /// 0 until counting starts
    #[serde(default)]
    pub current_epoch: u64,

    #[serde(default)]
    pub current_epoch_start: Option<DateTime<Utc>>,
}

impl EpochInfo {
    pub fn new(identifier: impl Into<String>, duration: Duration, start_time: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            duration,
            start_time,
            current_epoch: 0,
            current_epoch_start: None,
        }
    }

    fn end_of_current(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(start) = self.current_epoch_start else {
            return Ok(None);
        };
        let step = chrono::Duration::from_std(self.duration)
            .map_err(|_| Error::Overflow("epoch duration"))?;
        Ok(Some(start + step))
    }
}

/// Receivers of epoch boundaries
pub trait EpochHooks {
    fn before_epoch_start(&self, _ctx: &mut Context<'_>, _identifier: &str, _epoch: u64) -> Result<()> {
        Ok(())
    }

    fn after_epoch_end(&self, ctx: &mut Context<'_>, identifier: &str, epoch: u64) -> Result<()>;
}

/// Persists epoch state and fires boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochTracker;

impl EpochTracker {
    fn key(identifier: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(EPOCH_PREFIX);
        keys::push_str(&mut key, identifier)?;
        Ok(key)
    }

    /// Register epochs, keeping the state of ones already known.
    pub fn init(&self, ctx: &mut Context<'_>, epochs: &[EpochInfo]) -> Result<()> {
        for epoch in epochs {
            if epoch.duration.is_zero() {
                return Err(Error::Validation(format!(
                    "epoch {} has zero duration",
                    epoch.identifier
                )));
            }
            let key = Self::key(&epoch.identifier)?;
            if !ctx.store().has(&key)? {
                set_record(ctx.store_mut(), &key, epoch)?;
            }
        }
        Ok(())
    }

    pub fn epoch(&self, ctx: &Context<'_>, identifier: &str) -> Result<Option<EpochInfo>> {
        get_record(ctx.store(), &Self::key(identifier)?)
    }

    pub fn epochs(&self, ctx: &Context<'_>) -> Result<Vec<EpochInfo>> {
        ctx.store()
            .prefix_scan(EPOCH_PREFIX)?
            .into_iter()
            .map(|(_, v)| decode(&v))
            .collect()
    }

    /// Advance every epoch whose boundary has passed at the context's block time.
    ///
    /// Each hook call runs atomically. A failing hook is logged and its writes
    /// dropped; a fatal error halts the tick.
    pub fn tick(&self, ctx: &mut Context<'_>, hooks: &dyn EpochHooks) -> Result<()> {
        let now = ctx.block_time();
        for mut epoch in self.epochs(ctx)? {
            let id = epoch.identifier.clone();
            match epoch.end_of_current()? {
                None => {
                    if now < epoch.start_time {
                        continue;
                    }
                    epoch.current_epoch = 1;
                    epoch.current_epoch_start = Some(epoch.start_time);
                    set_record(ctx.store_mut(), &Self::key(&id)?, &epoch)?;
                    info!(identifier = %id, "epoch counting started");
                    Self::run_hook(ctx, &id, |c| hooks.before_epoch_start(c, &id, 1))?;
                }
                Some(end) if now >= end => {
                    let ended = epoch.current_epoch;
                    epoch.current_epoch += 1;
                    epoch.current_epoch_start = Some(end);
                    set_record(ctx.store_mut(), &Self::key(&id)?, &epoch)?;
                    debug!(identifier = %id, ended, "epoch end");
                    Self::run_hook(ctx, &id, |c| hooks.after_epoch_end(c, &id, ended))?;
                    let next = epoch.current_epoch;
                    Self::run_hook(ctx, &id, |c| hooks.before_epoch_start(c, &id, next))?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn run_hook(
        ctx: &mut Context<'_>,
        identifier: &str,
        f: impl FnOnce(&mut Context<'_>) -> Result<()>,
    ) -> Result<()> {
        match ctx.atomic(f) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(identifier, error = %e, "epoch hook failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        ended: RefCell<Vec<(String, u64)>>,
    }

    impl EpochHooks for Recorder {
        fn after_epoch_end(&self, _ctx: &mut Context<'_>, identifier: &str, epoch: u64) -> Result<()> {
            self.ended.borrow_mut().push((identifier.to_string(), epoch));
            Ok(())
        }
    }

    struct Failing;

    impl EpochHooks for Failing {
        fn after_epoch_end(&self, ctx: &mut Context<'_>, _identifier: &str, _epoch: u64) -> Result<()> {
            ctx.store_mut().set(b"written", vec![1])?;
            Err(Error::Validation("hook refused".into()))
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_tick_fires_one_boundary_per_call() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, t(0));
        let tracker = EpochTracker;
        tracker
            .init(&mut ctx, &[EpochInfo::new("day", Duration::from_secs(100), t(0))])
            .unwrap();
        let hooks = Recorder::default();

        tracker.tick(&mut ctx, &hooks).unwrap();
        assert!(hooks.ended.borrow().is_empty());
        assert_eq!(tracker.epoch(&ctx, "day").unwrap().unwrap().current_epoch, 1);

        ctx.set_block_time(t(250));
        tracker.tick(&mut ctx, &hooks).unwrap();
        tracker.tick(&mut ctx, &hooks).unwrap();
        tracker.tick(&mut ctx, &hooks).unwrap();
        assert_eq!(
            *hooks.ended.borrow(),
            vec![("day".to_string(), 1), ("day".to_string(), 2)]
        );
        let info = tracker.epoch(&ctx, "day").unwrap().unwrap();
        assert_eq!(info.current_epoch, 3);
        assert_eq!(info.current_epoch_start, Some(t(200)));
    }

    #[test]
    fn test_failed_hook_is_rolled_back_but_epoch_advances() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, t(0));
        let tracker = EpochTracker;
        tracker
            .init(&mut ctx, &[EpochInfo::new("day", Duration::from_secs(10), t(0))])
            .unwrap();
        tracker.tick(&mut ctx, &Failing).unwrap();

        ctx.set_block_time(t(10));
        tracker.tick(&mut ctx, &Failing).unwrap();
        assert!(!ctx.store().has(b"written").unwrap());
        assert_eq!(tracker.epoch(&ctx, "day").unwrap().unwrap().current_epoch, 2);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, t(0));
        let res = EpochTracker.init(&mut ctx, &[EpochInfo::new("day", Duration::ZERO, t(0))]);
        assert!(res.is_err());
    }
}
