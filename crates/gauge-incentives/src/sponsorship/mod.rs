//! Sponsorship ledger
//!
//! Stake-holders vote to direct their voting power to perpetual gauges. The
//! ledger (`Distribution`) holds the sum of all votes and is kept up to date
//! incrementally: votes and revocations merge their own allocation in or out,
//! and staking hooks merge the change of a single delegation.
//!
//! Votes on rollapp gauges also make the voter an endorser of that rollapp,
//! entitled to a share of the rollapp's endorsement gauge payouts.

pub mod distribution;
pub mod endorsement;
pub mod hooks;
pub mod invariants;
pub(crate) mod store;
mod votes;

pub use distribution::{Distribution, GaugePower, GaugeWeight};
pub use endorsement::{ClaimResult, Endorsement, EndorserPosition};
pub use hooks::StakingHooks;
pub use votes::{ValidatorBreakdown, ValidatorPower};

use crate::coins::Coins;
use crate::collaborators::{FundsLedger, RollappRegistry, StakingView};
use crate::config::SponsorshipParams;
use crate::context::Context;
use crate::error::Result;
use crate::math::mul_div_floor;
use crate::{AccountId, GaugeId, Power, RollappId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A voter's standing allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Power last applied to the ledger for this vote
    pub voting_power: Power,

    /// Percent per gauge, summing to 100
    pub weights: Vec<GaugeWeight>,
}

impl Vote {
    /// What this vote contributes to the ledger.
    pub fn to_distribution(&self) -> Result<Distribution> {
        Distribution::apply_weights(self.voting_power, &self.weights)
    }
}

pub struct Sponsorship {
    params: SponsorshipParams,
    staking: Arc<dyn StakingView>,
    rollapps: Arc<dyn RollappRegistry>,
    bank: Arc<dyn FundsLedger>,
}

impl Sponsorship {
    pub fn new(
        params: SponsorshipParams,
        staking: Arc<dyn StakingView>,
        rollapps: Arc<dyn RollappRegistry>,
        bank: Arc<dyn FundsLedger>,
    ) -> Self {
        Self {
            params,
            staking,
            rollapps,
            bank,
        }
    }

    pub fn params(&self) -> &SponsorshipParams {
        &self.params
    }

    /// Merge `update` into the ledger and persist it.
    ///
    /// A ledger that stops being well-formed means some update was applied
    /// twice or never; that is corruption.
    pub(crate) fn update_distribution(&self, ctx: &mut Context<'_>, update: &Distribution) -> Result<Distribution> {
        let current = store::distribution(ctx)?;
        let next = current.merge(update)?;
        next.validate()?;
        store::set_distribution(ctx, &next)?;
        Ok(next)
    }

    // === queries ===

    pub fn distribution(&self, ctx: &Context<'_>) -> Result<Distribution> {
        store::distribution(ctx)
    }

    pub fn get_vote(&self, ctx: &Context<'_>, voter: &str) -> Result<Option<Vote>> {
        store::vote(ctx, voter)
    }

    pub fn voted(&self, ctx: &Context<'_>, voter: &str) -> Result<bool> {
        Ok(store::vote(ctx, voter)?.is_some())
    }

    pub fn votes(&self, ctx: &Context<'_>) -> Result<Vec<(AccountId, Vote)>> {
        store::votes(ctx)
    }

    /// Power last applied to the ledger for the pair
    pub fn delegator_validator_power(
        &self,
        ctx: &Context<'_>,
        voter: &str,
        validator: &str,
    ) -> Result<Option<Power>> {
        store::power(ctx, voter, validator)
    }

    pub fn endorsement(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<Option<Endorsement>> {
        store::endorsement(ctx, rollapp_id)
    }

    pub fn endorser_position(
        &self,
        ctx: &Context<'_>,
        voter: &str,
        rollapp_id: &RollappId,
    ) -> Result<Option<EndorserPosition>> {
        store::position(ctx, voter, rollapp_id)
    }

    /// Split `coins` over the ledger's gauges in proportion to their power.
    ///
    /// Every share is floored; what does not divide evenly is not assigned.
    pub fn split_by_distribution(&self, ctx: &Context<'_>, coins: &Coins) -> Result<Vec<(GaugeId, Coins)>> {
        let ledger = store::distribution(ctx)?;
        let allocated = ledger.allocated();
        if allocated <= 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(ledger.gauges.len());
        for g in &ledger.gauges {
            let mut share = Coins::new();
            for (denom, amount) in coins.iter() {
                share.add_amount(denom, mul_div_floor(amount, g.power as u128, allocated as u128)?)?;
            }
            if !share.is_empty() {
                out.push((g.gauge_id, share));
            }
        }
        Ok(out)
    }
}
