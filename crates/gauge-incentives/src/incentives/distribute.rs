//! Distribution pass over a set of gauges

use super::asset::LockCache;
use super::gauge::{DistributeTo, Gauge, GaugeStatus};
use super::{store, Incentives};
use crate::coins::Coins;
use crate::collaborators::INCENTIVES_MODULE;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::{AccountId, Balance, RollappId};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Payouts of one pass, batched per recipient in first-seen order
#[derive(Debug, Default)]
pub(crate) struct DistributionInfo {
    payouts: Vec<(AccountId, Coins)>,
    index: HashMap<AccountId, usize>,
}

impl DistributionInfo {
    pub(crate) fn add(&mut self, owner: &str, coins: &Coins) -> Result<()> {
        match self.index.get(owner) {
            Some(&i) => self.payouts[i].1.add(coins),
            None => {
                self.index.insert(owner.to_string(), self.payouts.len());
                self.payouts.push((owner.to_string(), coins.clone()));
                Ok(())
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.payouts.len()
    }
}

/// Per-epoch slice of `remaining`, floored per denom.
fn epoch_share(remaining: &Coins, remaining_epochs: u64) -> Coins {
    if remaining_epochs <= 1 {
        return remaining.clone();
    }
    remaining
        .iter()
        .map(|(denom, amount)| (denom.clone(), amount / remaining_epochs as Balance))
        .collect()
}

impl Incentives {
    /// Pay out one epoch of every given gauge that is currently Active.
    ///
    /// Gauges are re-read from the store and each id is paid at most once per
    /// pass, so stale or repeated entries are skipped. Lock payouts are batched
    /// into one transfer per owner. Any failed transfer aborts the whole pass.
    /// Returns the total paid.
    pub fn distribute(&self, ctx: &mut Context<'_>, gauges: &[Gauge]) -> Result<Coins> {
        ctx.atomic(|ctx| self.distribute_inner(ctx, gauges))
    }

    /// Distribute every Active gauge.
    pub fn distribute_active(&self, ctx: &mut Context<'_>) -> Result<Coins> {
        let active = self.active_gauges(ctx)?;
        self.distribute(ctx, &active)
    }

    fn distribute_inner(&self, ctx: &mut Context<'_>, gauges: &[Gauge]) -> Result<Coins> {
        let mut info = DistributionInfo::default();
        let mut cache = LockCache::default();
        let mut total = Coins::new();
        let mut finished = Vec::new();
        let mut seen = BTreeSet::new();

        for stale in gauges {
            if !seen.insert(stale.id) {
                debug!(gauge_id = stale.id, "gauge listed twice, skipping");
                continue;
            }
            let mut gauge = store::must_get_gauge(ctx, stale.id)?;
            if store::status_of(ctx, &gauge)? != Some(GaugeStatus::Active) {
                debug!(gauge_id = gauge.id, "gauge not active, skipping");
                continue;
            }

            let payout = match &gauge.distribute_to {
                DistributeTo::Asset(cond) => {
                    self.distribute_to_asset(ctx, &gauge, cond, &mut cache, &mut info)?
                }
                DistributeTo::Rollapp { rollapp_id } => {
                    self.distribute_to_rollapp(ctx, &gauge, rollapp_id, &mut info)?
                }
                DistributeTo::Endorsement { rollapp_id } => {
                    self.distribute_to_endorsement(ctx, &gauge, rollapp_id)?
                }
            };
            let Some(payout) = payout else {
                continue;
            };

            gauge.filled_epochs += 1;
            gauge.distributed_coins.add(&payout)?;
            if !gauge.distributed_coins.is_all_lte(&gauge.coins) {
                return Err(Error::Corrupted(format!(
                    "gauge {} would distribute {} out of {}",
                    gauge.id, gauge.distributed_coins, gauge.coins
                )));
            }
            store::set_gauge(ctx, &gauge)?;
            total.add(&payout)?;

            if gauge.is_finished() {
                finished.push(gauge);
            }
        }

        self.send_rewards(ctx, info)?;

        for gauge in &finished {
            self.finish_gauge(ctx, gauge)?;
        }

        info!(
            gauges = gauges.len(),
            finished = finished.len(),
            paid = %total,
            "distribution pass complete"
        );
        Ok(total)
    }

    /// The rollapp's owner at payout time receives its epoch share.
    fn distribute_to_rollapp(
        &self,
        ctx: &Context<'_>,
        gauge: &Gauge,
        rollapp_id: &RollappId,
        info: &mut DistributionInfo,
    ) -> Result<Option<Coins>> {
        let payout = epoch_share(&gauge.remaining()?, gauge.remaining_epochs());
        if payout.is_empty() {
            return Ok(None);
        }
        let Some(owner) = self.rollapps.rollapp_owner(ctx, rollapp_id)? else {
            warn!(gauge_id = gauge.id, rollapp_id = %rollapp_id, "rollapp has no owner, skipping");
            return Ok(None);
        };
        info.add(&owner, &payout)?;
        Ok(Some(payout))
    }

    /// Credit the epoch share to the rollapp's endorsers; the coins stay in
    /// escrow until claimed.
    fn distribute_to_endorsement(
        &self,
        ctx: &mut Context<'_>,
        gauge: &Gauge,
        rollapp_id: &RollappId,
    ) -> Result<Option<Coins>> {
        let payout = epoch_share(&gauge.remaining()?, gauge.remaining_epochs());
        if payout.is_empty() {
            return Ok(None);
        }
        let Some(sink) = &self.endorsements else {
            warn!(gauge_id = gauge.id, "no endorsement sink registered, skipping");
            return Ok(None);
        };
        if !sink.add_endorsement_rewards(ctx, rollapp_id, &payout)? {
            debug!(gauge_id = gauge.id, rollapp_id = %rollapp_id, "rollapp has no endorsers, skipping");
            return Ok(None);
        }
        Ok(Some(payout))
    }

    /// One transfer per recipient, then one event per recipient.
    fn send_rewards(&self, ctx: &mut Context<'_>, info: DistributionInfo) -> Result<()> {
        debug!(recipients = info.len(), "sending rewards");
        for (owner, coins) in &info.payouts {
            self.bank.send_from_module(ctx, INCENTIVES_MODULE, owner, coins)?;
        }
        for (receiver, amount) in info.payouts {
            ctx.emit(Event::Distribution { receiver, amount });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_batches_per_owner() {
        let mut info = DistributionInfo::default();
        info.add("bob", &Coins::single("adym", 5)).unwrap();
        info.add("alice", &Coins::single("adym", 1)).unwrap();
        info.add("bob", &Coins::single("adym", 7)).unwrap();

        assert_eq!(info.len(), 2);
        assert_eq!(
            info.payouts,
            vec![
                ("bob".to_string(), Coins::single("adym", 12)),
                ("alice".to_string(), Coins::single("adym", 1)),
            ]
        );
    }

    #[test]
    fn test_epoch_share_floors() {
        let remaining: Coins = vec![("adym".to_string(), 10), ("lp".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(epoch_share(&remaining, 3), Coins::single("adym", 3));
        assert_eq!(epoch_share(&remaining, 1), remaining);
    }
}
