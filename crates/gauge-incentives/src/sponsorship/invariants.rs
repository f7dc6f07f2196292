//! Sponsorship ledger invariants
//!
//! These compare the incrementally maintained ledger against independent
//! recomputations. They only report.

use super::distribution::Distribution;
use super::{store, Sponsorship};
use crate::context::Context;
use crate::error::Result;
use crate::invariant::Violation;
use crate::{AccountId, Power};
use std::collections::BTreeMap;

/// Allowed gap between a snapshot and the live staking power
const STAKING_SYNC_TOLERANCE: Power = 1;

impl Sponsorship {
    pub fn check_invariants(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = self.check_delegator_validator_power(ctx)?;
        out.extend(self.check_distribution(ctx)?);
        out.extend(self.check_votes(ctx)?);
        out.extend(self.check_general(ctx)?);
        out.extend(self.check_endorsements(ctx)?);
        Ok(out)
    }

    /// Every stored snapshot is positive; zero snapshots are deleted.
    pub fn check_delegator_validator_power(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        Ok(store::all_powers(ctx)?
            .into_iter()
            .filter(|(_, _, power)| *power <= 0)
            .map(|(voter, validator, power)| {
                Violation::new(
                    "sponsorship/delegator-validator-power",
                    format!("{} -> {} holds power {}", voter, validator, power),
                )
            })
            .collect())
    }

    pub fn check_distribution(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        match store::distribution(ctx)?.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(e) => Ok(vec![Violation::new("sponsorship/distribution", e.to_string())]),
        }
    }

    /// Every vote has well-formed weights on perpetual gauges and holds
    /// enough power.
    pub fn check_votes(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        for (voter, vote) in store::votes(ctx)? {
            if let Err(e) = self.validate_weights_basic(&vote.weights) {
                out.push(Violation::new("sponsorship/votes", format!("vote of {}: {}", voter, e)));
            }
            for w in &vote.weights {
                let perpetual = crate::incentives::store::get_gauge(ctx, w.gauge_id)?.map(|g| g.is_perpetual);
                if perpetual != Some(true) {
                    out.push(Violation::new(
                        "sponsorship/votes",
                        format!("vote of {} targets gauge {} which is missing or not perpetual", voter, w.gauge_id),
                    ));
                }
            }
            if vote.voting_power <= 0 || vote.voting_power < self.params.min_voting_power {
                out.push(Violation::new(
                    "sponsorship/votes",
                    format!("vote of {} holds power {}", voter, vote.voting_power),
                ));
            }
        }
        Ok(out)
    }

    /// Snapshots add up to their vote, votes add up to the ledger total, and
    /// recomputing the ledger from scratch gives the stored one.
    pub fn check_general(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        let ledger = store::distribution(ctx)?;
        let votes = store::votes(ctx)?;

        let mut snapshot_sums: BTreeMap<AccountId, Power> = BTreeMap::new();
        for (voter, _, power) in store::all_powers(ctx)? {
            *snapshot_sums.entry(voter).or_insert(0) += power;
        }

        let mut recomputed = Distribution::empty();
        for (voter, vote) in &votes {
            let snapshots = snapshot_sums.remove(voter).unwrap_or(0);
            if snapshots != vote.voting_power {
                out.push(Violation::new(
                    "sponsorship/general",
                    format!(
                        "snapshots of {} sum to {}, vote holds {}",
                        voter, snapshots, vote.voting_power
                    ),
                ));
            }
            recomputed = recomputed.merge(&vote.to_distribution()?)?;
        }
        for (voter, power) in snapshot_sums {
            out.push(Violation::new(
                "sponsorship/general",
                format!("{} has snapshots worth {} but no vote", voter, power),
            ));
        }
        if recomputed != ledger {
            out.push(Violation::new(
                "sponsorship/general",
                format!("ledger {:?} differs from recomputed {:?}", ledger, recomputed),
            ));
        }
        Ok(out)
    }

    /// Drift between snapshots and the live staking view.
    ///
    /// Slashing changes validator tokens without a delegation hook, so drift
    /// here is expected after a slash until the delegation next changes.
    pub fn check_staking_sync(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        for (voter, validator, snapshot) in store::all_powers(ctx)? {
            let live = self.delegation_power(ctx, &voter, &validator)?;
            if (live - snapshot).abs() > STAKING_SYNC_TOLERANCE {
                out.push(Violation::new(
                    "sponsorship/staking-sync",
                    format!(
                        "{} -> {}: snapshot {}, staking {}",
                        voter, validator, snapshot, live
                    ),
                ));
            }
        }
        Ok(out)
    }

    /// Endorsement shares match the ledger power of the rollapp gauge and the
    /// sum of positions.
    pub fn check_endorsements(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        let ledger = store::distribution(ctx)?;

        let mut position_sums: BTreeMap<String, Power> = BTreeMap::new();
        for (_, rollapp_id, p) in store::all_positions(ctx)? {
            *position_sums.entry(rollapp_id).or_insert(0) += p.shares;
        }

        for e in store::endorsements(ctx)? {
            let positions = position_sums.get(&e.rollapp_id).copied().unwrap_or(0);
            if positions != e.total_shares {
                out.push(Violation::new(
                    "sponsorship/endorsements",
                    format!(
                        "{} positions hold {} shares, endorsement {}",
                        e.rollapp_id, positions, e.total_shares
                    ),
                ));
            }
            let gauge_power = crate::incentives::store::rollapp_gauge_id(ctx, &e.rollapp_id)?
                .map_or(0, |id| ledger.power_of(id));
            if gauge_power != e.total_shares {
                out.push(Violation::new(
                    "sponsorship/endorsements",
                    format!(
                        "{} ledger power {}, endorsement shares {}",
                        e.rollapp_id, gauge_power, e.total_shares
                    ),
                ));
            }
            if !e.distributed_coins.is_all_lte(&e.total_coins) {
                out.push(Violation::new(
                    "sponsorship/endorsements",
                    format!("{} paid {} of {}", e.rollapp_id, e.distributed_coins, e.total_coins),
                ));
            }
        }
        Ok(out)
    }
}
