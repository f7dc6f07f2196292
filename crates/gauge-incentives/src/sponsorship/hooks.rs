//! Staking hook synchronizer
//!
//! The staking module calls these on every delegation change. Only voters are
//! tracked; everyone else is a no-op. Each call touches one (voter,
//! validator) pair and merges only its change into the ledger.

use super::distribution::Distribution;
use super::{store, Sponsorship};
use crate::context::Context;
use crate::error::Result;
use crate::events::Event;
use crate::Power;
use tracing::{debug, info};

/// Delegation change notifications
pub trait StakingHooks {
    /// A delegation was created or its shares changed.
    fn after_delegation_modified(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str) -> Result<()>;

    /// A delegation is about to be removed entirely.
    fn before_delegation_removed(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str) -> Result<()>;
}

impl StakingHooks for Sponsorship {
    fn after_delegation_modified(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str) -> Result<()> {
        ctx.atomic(|ctx| {
            let power = self.delegation_power(ctx, delegator, validator)?;
            self.process_hook(ctx, delegator, validator, power)
        })
    }

    fn before_delegation_removed(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str) -> Result<()> {
        ctx.atomic(|ctx| self.process_hook(ctx, delegator, validator, 0))
    }
}

impl Sponsorship {
    fn process_hook(&self, ctx: &mut Context<'_>, voter: &str, validator: &str, new_power: Power) -> Result<()> {
        let Some(mut vote) = store::vote(ctx, voter)? else {
            return Ok(());
        };
        let old_power = store::power(ctx, voter, validator)?.unwrap_or(0);
        let diff = new_power - old_power;
        if diff == 0 {
            debug!(voter, validator, "voting power unchanged");
            return Ok(());
        }
        let new_total = vote.voting_power + diff;

        if new_total < self.params.min_voting_power || new_total <= 0 {
            let ledger = self.revoke_vote_inner(ctx, voter, &vote)?;
            ctx.emit(Event::VotingPowerUpdate {
                voter: voter.to_string(),
                validator: validator.to_string(),
                diff,
                new_total,
                pruned: true,
                distribution: ledger,
            });
            info!(voter, validator, new_total = %new_total, "vote pruned, power below minimum");
            return Ok(());
        }

        // ledger == sum of vote allocations, so merge the allocation delta
        let before = vote.to_distribution()?;
        vote.voting_power = new_total;
        let update: Distribution = vote.to_distribution()?.merge(&before.negate())?;

        let ledger = self.update_distribution(ctx, &update)?;
        self.update_endorsements(ctx, voter, &update)?;
        store::set_vote(ctx, voter, &vote)?;
        if new_power == 0 {
            store::delete_power(ctx, voter, validator)?;
        } else {
            store::set_power(ctx, voter, validator, new_power)?;
        }

        ctx.emit(Event::VotingPowerUpdate {
            voter: voter.to_string(),
            validator: validator.to_string(),
            diff,
            new_total,
            pruned: false,
            distribution: ledger,
        });
        debug!(voter, validator, diff = %diff, new_total = %new_total, "voting power updated");
        Ok(())
    }
}
