//! Casting and revoking votes

use super::distribution::{Distribution, GaugeWeight};
use super::{store, Sponsorship, Vote};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::incentives::store as gauges;
use crate::incentives::DistributeTo;
use crate::{Power, ValidatorId};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Power a voter gets from one validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorPower {
    pub validator: ValidatorId,
    pub power: Power,
}

/// A voter's power split per validator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorBreakdown {
    pub total_power: Power,
    pub breakdown: Vec<ValidatorPower>,
}

impl Sponsorship {
    /// Replace `voter`'s allocation with `weights`, backed by their current
    /// delegations.
    pub fn vote(&self, ctx: &mut Context<'_>, voter: &str, weights: Vec<GaugeWeight>) -> Result<(Vote, Distribution)> {
        ctx.atomic(|ctx| {
            self.validate_weights(ctx, &weights)?;

            if let Some(existing) = store::vote(ctx, voter)? {
                self.revoke_vote_inner(ctx, voter, &existing)?;
            }

            let breakdown = self.validator_breakdown(ctx, voter)?;
            if breakdown.total_power < self.params.min_voting_power || breakdown.total_power <= 0 {
                return Err(Error::InsufficientPower {
                    have: breakdown.total_power,
                    min: self.params.min_voting_power,
                });
            }

            let vote = Vote {
                voting_power: breakdown.total_power,
                weights,
            };
            let update = vote.to_distribution()?;
            let ledger = self.update_distribution(ctx, &update)?;
            self.update_endorsements(ctx, voter, &update)?;

            store::set_vote(ctx, voter, &vote)?;
            for vp in breakdown.breakdown.iter().filter(|vp| vp.power != 0) {
                store::set_power(ctx, voter, &vp.validator, vp.power)?;
            }

            ctx.emit(Event::Vote {
                voter: voter.to_string(),
                voting_power: vote.voting_power,
                distribution: ledger.clone(),
            });
            info!(voter, power = %vote.voting_power, gauges = vote.weights.len(), "vote cast");
            Ok((vote, ledger))
        })
    }

    /// Withdraw `voter`'s allocation from the ledger.
    pub fn revoke_vote(&self, ctx: &mut Context<'_>, voter: &str) -> Result<Distribution> {
        ctx.atomic(|ctx| {
            let vote = store::vote(ctx, voter)?.ok_or_else(|| Error::VoteNotFound(voter.to_string()))?;
            self.revoke_vote_inner(ctx, voter, &vote)
        })
    }

    pub(crate) fn revoke_vote_inner(&self, ctx: &mut Context<'_>, voter: &str, vote: &Vote) -> Result<Distribution> {
        let update = vote.to_distribution()?.negate();
        let ledger = self.update_distribution(ctx, &update)?;
        self.update_endorsements(ctx, voter, &update)?;

        store::delete_vote(ctx, voter)?;
        store::delete_powers_of(ctx, voter)?;

        ctx.emit(Event::RevokeVote {
            voter: voter.to_string(),
            distribution: ledger.clone(),
        });
        info!(voter, power = %vote.voting_power, "vote revoked");
        Ok(ledger)
    }

    /// Reject weights that could not form a vote.
    ///
    /// Each gauge must be listed once, exist and be perpetual; each weight
    /// must reach the minimum allocation; the weights must add up to 100.
    /// A rollapp gauge also needs at least one bonded sequencer.
    pub fn validate_weights(&self, ctx: &Context<'_>, weights: &[GaugeWeight]) -> Result<()> {
        self.validate_weights_basic(weights)?;
        for w in weights {
            let gauge = gauges::get_gauge(ctx, w.gauge_id)?.ok_or(Error::GaugeNotFound(w.gauge_id))?;
            if !gauge.is_perpetual {
                return Err(Error::GaugeNotPerpetual(w.gauge_id));
            }
            if let DistributeTo::Rollapp { rollapp_id } = &gauge.distribute_to {
                if self.rollapps.bonded_sequencers(ctx, rollapp_id)? == 0 {
                    return Err(Error::NoBondedSequencer(rollapp_id.clone()));
                }
            }
        }
        Ok(())
    }

    /// Stateless part of weight validation.
    pub(crate) fn validate_weights_basic(&self, weights: &[GaugeWeight]) -> Result<()> {
        if weights.is_empty() {
            return Err(Error::InvalidWeights("no gauges given".into()));
        }
        let mut seen = BTreeSet::new();
        let mut sum: u64 = 0;
        for w in weights {
            if !seen.insert(w.gauge_id) {
                return Err(Error::InvalidWeights(format!("gauge {} listed twice", w.gauge_id)));
            }
            if w.weight == 0 {
                return Err(Error::InvalidWeights(format!("gauge {} has zero weight", w.gauge_id)));
            }
            if w.weight < self.params.min_allocation_weight {
                return Err(Error::WeightBelowMinimum {
                    gauge_id: w.gauge_id,
                    weight: w.weight,
                    min: self.params.min_allocation_weight,
                });
            }
            sum += w.weight as u64;
        }
        if sum != 100 {
            return Err(Error::InvalidWeights(format!("weights sum to {}, not 100", sum)));
        }
        Ok(())
    }

    /// Current power of `voter` from every delegation, rounding each up.
    pub fn validator_breakdown(&self, ctx: &Context<'_>, voter: &str) -> Result<ValidatorBreakdown> {
        let mut out = ValidatorBreakdown::default();
        for d in self.staking.delegations_of(ctx, voter)? {
            let power = self.delegation_power(ctx, voter, &d.validator)?;
            out.total_power = out
                .total_power
                .checked_add(power)
                .ok_or(Error::Overflow("voting power"))?;
            out.breakdown.push(ValidatorPower {
                validator: d.validator,
                power,
            });
        }
        debug!(voter, total = %out.total_power, validators = out.breakdown.len(), "validator breakdown");
        Ok(out)
    }

    /// Live power of a single delegation; zero when it does not exist.
    pub(crate) fn delegation_power(&self, ctx: &Context<'_>, voter: &str, validator: &str) -> Result<Power> {
        let Some(d) = self.staking.delegation(ctx, voter, validator)? else {
            return Ok(0);
        };
        let v = self
            .staking
            .validator(ctx, validator)?
            .ok_or_else(|| Error::ValidatorNotFound(validator.to_string()))?;
        let tokens = v.tokens_from_shares(d.shares)?;
        Power::try_from(tokens).map_err(|_| Error::Overflow("voting power"))
    }
}
