//! Endorsement rewards
//!
//! Voting power allocated to a rollapp gauge counts as endorsement shares of
//! that rollapp. Endorsement gauge payouts are spread over the shares with a
//! lazy accumulator: each payout raises `accumulator` by `coins / total_shares`
//! and an endorser is owed `(accumulator - last_seen) * shares`.
//!
//! Accumulator values are fixed point, scaled by `ACC_PRECISION`, and always
//! rounded down, so the sum of claims never exceeds what was credited.

use super::distribution::Distribution;
use super::{store, Sponsorship};
use crate::coins::Coins;
use crate::collaborators::INCENTIVES_MODULE;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::incentives::store as gauges;
use crate::incentives::{DistributeTo, EndorsementSink};
use crate::math::{mul_div_floor, ACC_PRECISION};
use crate::{Balance, Denom, GaugeId, Power, RollappId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-denom reward per share, scaled by `ACC_PRECISION`
pub type Accumulator = BTreeMap<Denom, Balance>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub rollapp_id: RollappId,

    /// Sum of every endorser's shares
    pub total_shares: Power,

    pub accumulator: Accumulator,

    /// Credited by endorsement gauges
    pub total_coins: Coins,

    /// Claimed by endorsers
    pub distributed_coins: Coins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorserPosition {
    pub shares: Power,
    pub last_seen_accumulator: Accumulator,

    /// Rewards settled at a share change and not yet claimed
    pub unclaimed: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub rollapp_id: RollappId,
    pub rewards: Coins,
}

impl Endorsement {
    fn new(rollapp_id: &str) -> Self {
        Self {
            rollapp_id: rollapp_id.to_string(),
            ..Default::default()
        }
    }

    /// Raise the accumulator by `coins / total_shares`.
    fn credit(&mut self, coins: &Coins) -> Result<()> {
        let shares = Balance::try_from(self.total_shares)
            .map_err(|_| Error::Corrupted(format!("negative endorsement shares on {}", self.rollapp_id)))?;
        for (denom, amount) in coins.iter() {
            let per_share = mul_div_floor(amount, ACC_PRECISION, shares)?;
            let acc = self.accumulator.entry(denom.clone()).or_insert(0);
            *acc = acc.checked_add(per_share).ok_or(Error::Overflow("accumulator"))?;
        }
        self.total_coins.add(coins)
    }
}

impl EndorserPosition {
    /// Rewards accrued since the last settlement, not counting `unclaimed`.
    fn accrued(&self, acc: &Accumulator) -> Result<Coins> {
        let shares = Balance::try_from(self.shares)
            .map_err(|_| Error::Corrupted("negative endorser shares".into()))?;
        let mut out = Coins::new();
        for (denom, current) in acc {
            let seen = self.last_seen_accumulator.get(denom).copied().unwrap_or(0);
            let delta = current
                .checked_sub(seen)
                .ok_or_else(|| Error::Corrupted(format!("accumulator for {} went backwards", denom)))?;
            out.add_amount(denom, mul_div_floor(delta, shares, ACC_PRECISION)?)?;
        }
        Ok(out)
    }

    /// Everything the endorser could claim now.
    fn pending(&self, acc: &Accumulator) -> Result<Coins> {
        self.unclaimed.plus(&self.accrued(acc)?)
    }

    /// Fold accrued rewards into `unclaimed` and catch up with `acc`.
    fn settle(&mut self, acc: &Accumulator) -> Result<()> {
        let accrued = self.accrued(acc)?;
        self.unclaimed.add(&accrued)?;
        self.last_seen_accumulator = acc.clone();
        Ok(())
    }
}

impl Sponsorship {
    /// Apply a ledger update to the endorsements of every rollapp gauge it
    /// touches. Pending rewards are settled before shares change.
    pub(crate) fn update_endorsements(&self, ctx: &mut Context<'_>, voter: &str, update: &Distribution) -> Result<()> {
        for entry in &update.gauges {
            let gauge = gauges::get_gauge(ctx, entry.gauge_id)?
                .ok_or_else(|| Error::Corrupted(format!("ledger references missing gauge {}", entry.gauge_id)))?;
            let DistributeTo::Rollapp { rollapp_id } = &gauge.distribute_to else {
                continue;
            };

            let mut endorsement =
                store::endorsement(ctx, rollapp_id)?.unwrap_or_else(|| Endorsement::new(rollapp_id));
            endorsement.total_shares += entry.power;
            if endorsement.total_shares < 0 {
                return Err(Error::Corrupted(format!(
                    "endorsement shares of {} went negative",
                    rollapp_id
                )));
            }

            let mut position = store::position(ctx, voter, rollapp_id)?.unwrap_or_default();
            position.settle(&endorsement.accumulator)?;
            position.shares += entry.power;
            if position.shares < 0 {
                return Err(Error::Corrupted(format!(
                    "endorser {} shares of {} went negative",
                    voter, rollapp_id
                )));
            }

            store::set_endorsement(ctx, &endorsement)?;
            if position.shares == 0 && position.unclaimed.is_empty() {
                store::delete_position(ctx, voter, rollapp_id)?;
            } else {
                store::set_position(ctx, voter, rollapp_id, &position)?;
            }
        }
        Ok(())
    }

    fn endorsed_rollapp(&self, ctx: &Context<'_>, gauge_id: GaugeId) -> Result<RollappId> {
        let gauge = gauges::get_gauge(ctx, gauge_id)?.ok_or(Error::GaugeNotFound(gauge_id))?;
        match gauge.distribute_to {
            DistributeTo::Rollapp { rollapp_id } => Ok(rollapp_id),
            _ => Err(Error::Validation(format!("gauge {} is not a rollapp gauge", gauge_id))),
        }
    }

    /// Rewards `claimer` could claim for the rollapp of `gauge_id`. Read-only.
    pub fn estimate_claim(&self, ctx: &Context<'_>, claimer: &str, gauge_id: GaugeId) -> Result<ClaimResult> {
        let rollapp_id = self.endorsed_rollapp(ctx, gauge_id)?;
        let acc = store::endorsement(ctx, &rollapp_id)?
            .map(|e| e.accumulator)
            .unwrap_or_default();
        let rewards = match store::position(ctx, claimer, &rollapp_id)? {
            Some(position) => position.pending(&acc)?,
            None => Coins::new(),
        };
        Ok(ClaimResult { rollapp_id, rewards })
    }

    /// Pay `claimer` their endorsement rewards for the rollapp of `gauge_id`
    /// out of the incentives escrow.
    pub fn claim(&self, ctx: &mut Context<'_>, claimer: &str, gauge_id: GaugeId) -> Result<ClaimResult> {
        ctx.atomic(|ctx| {
            let rollapp_id = self.endorsed_rollapp(ctx, gauge_id)?;
            let mut position = store::position(ctx, claimer, &rollapp_id)?
                .ok_or_else(|| Error::Validation(format!("{} does not endorse {}", claimer, rollapp_id)))?;
            let mut endorsement = store::endorsement(ctx, &rollapp_id)?
                .ok_or_else(|| Error::Corrupted(format!("position without endorsement for {}", rollapp_id)))?;

            position.settle(&endorsement.accumulator)?;
            let rewards = std::mem::take(&mut position.unclaimed);
            if rewards.is_empty() {
                return Ok(ClaimResult { rollapp_id, rewards });
            }

            self.bank.send_from_module(ctx, INCENTIVES_MODULE, claimer, &rewards)?;
            endorsement.distributed_coins.add(&rewards)?;
            store::set_endorsement(ctx, &endorsement)?;
            if position.shares == 0 {
                store::delete_position(ctx, claimer, &rollapp_id)?;
            } else {
                store::set_position(ctx, claimer, &rollapp_id, &position)?;
            }

            ctx.emit(Event::EndorsementClaimed {
                claimer: claimer.to_string(),
                rollapp_id: rollapp_id.clone(),
                rewards: rewards.clone(),
            });
            info!(claimer, rollapp_id = %rollapp_id, rewards = %rewards, "endorsement rewards claimed");
            Ok(ClaimResult { rollapp_id, rewards })
        })
    }
}

impl EndorsementSink for Sponsorship {
    fn add_endorsement_rewards(&self, ctx: &mut Context<'_>, rollapp_id: &RollappId, coins: &Coins) -> Result<bool> {
        let Some(mut endorsement) = store::endorsement(ctx, rollapp_id)? else {
            return Ok(false);
        };
        if endorsement.total_shares <= 0 {
            return Ok(false);
        }
        endorsement.credit(coins)?;
        store::set_endorsement(ctx, &endorsement)?;
        ctx.emit(Event::EndorsementRewardsAdded {
            rollapp_id: rollapp_id.clone(),
            coins: coins.clone(),
        });
        debug!(rollapp_id = %rollapp_id, coins = %coins, shares = %endorsement.total_shares, "endorsement credited");
        Ok(true)
    }
}
