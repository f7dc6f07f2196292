//! Asset gauge payouts: pro-rata to lock holders

use super::distribute::DistributionInfo;
use super::gauge::{Gauge, QueryCondition};
use super::Incentives;
use crate::coins::Coins;
use crate::collaborators::Lock;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::mul_div_floor;
use crate::{Balance, Denom};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Locks per denom, loaded once per distribution pass
#[derive(Default)]
pub(crate) struct LockCache {
    by_denom: HashMap<Denom, Vec<Lock>>,
}

impl LockCache {
    fn locks_for<'c>(
        &'c mut self,
        incentives: &Incentives,
        ctx: &Context<'_>,
        denom: &str,
    ) -> Result<&'c [Lock]> {
        if !self.by_denom.contains_key(denom) {
            let locks = incentives.locks.locks_longer_than(ctx, denom, Duration::ZERO)?;
            self.by_denom.insert(denom.to_string(), locks);
        }
        Ok(self.by_denom.get(denom).map(Vec::as_slice).unwrap_or(&[]))
    }
}

/// Sum of `denom` over `locks`.
pub(crate) fn sum_locks_by_denom(locks: &[&Lock], denom: &str) -> Result<Balance> {
    locks.iter().try_fold(0u128, |acc, lock| {
        acc.checked_add(lock.coins.amount_of(denom))
            .ok_or(Error::Overflow("lock sum"))
    })
}

impl Incentives {
    /// Queue this epoch's payouts of an asset gauge into `info`.
    ///
    /// Returns `None` when no lock qualifies; the gauge then does not use up
    /// an epoch.
    pub(crate) fn distribute_to_asset(
        &self,
        ctx: &Context<'_>,
        gauge: &Gauge,
        cond: &QueryCondition,
        cache: &mut LockCache,
        info: &mut DistributionInfo,
    ) -> Result<Option<Coins>> {
        let now = ctx.block_time();
        let all = cache.locks_for(self, ctx, &cond.denom)?;
        let locks: Vec<&Lock> = all.iter().filter(|l| cond.matches(l, now)).collect();

        let lock_sum = sum_locks_by_denom(&locks, &cond.denom)?;
        if lock_sum == 0 {
            debug!(gauge_id = gauge.id, denom = %cond.denom, "no eligible locks, skipping");
            return Ok(None);
        }

        let remaining = gauge.remaining()?;
        let remaining_epochs = gauge.remaining_epochs();
        if remaining_epochs == 0 {
            return Err(Error::Corrupted(format!(
                "active gauge {} has no epochs left",
                gauge.id
            )));
        }
        if remaining.is_empty() {
            return Ok(Some(Coins::new()));
        }

        let denominator = lock_sum
            .checked_mul(remaining_epochs as Balance)
            .ok_or(Error::Overflow("lock sum times epochs"))?;

        let mut total = Coins::new();
        for lock in locks {
            let lock_amount = lock.coins.amount_of(&cond.denom);
            let mut payout = Coins::new();
            for (denom, amount) in remaining.iter() {
                payout.add_amount(denom, mul_div_floor(amount, lock_amount, denominator)?)?;
            }
            if payout.is_empty() {
                continue;
            }
            info.add(&lock.owner, &payout)?;
            total.add(&payout)?;
        }
        Ok(Some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_sum_locks_by_denom() {
        let lock = |amount| Lock {
            id: 0,
            owner: "a".into(),
            coins: Coins::single("lp", amount),
            duration: Duration::from_secs(1),
            created_at: Utc::now(),
        };
        let (a, b) = (lock(10), lock(20));
        assert_eq!(sum_locks_by_denom(&[&a, &b], "lp").unwrap(), 30);
        assert_eq!(sum_locks_by_denom(&[&a, &b], "adym").unwrap(), 0);

        let (c, d) = (lock(u128::MAX), lock(1));
        assert!(sum_locks_by_denom(&[&c, &d], "lp").is_err());
    }
}
