//! Interfaces to the modules this crate consumes but does not own
//!
//! - funds ledger: balances, escrow transfers, supply lookups
//! - lock view: token locks that asset gauges pay out to
//! - staking view: delegations, from which voting power is derived
//! - rollapp registry: recipients of rollapp and endorsement gauges
//!
//! Every method receives the step's `Context`, so a collaborator that keeps
//! its state in the same store is rolled back together with ours.

use crate::coins::Coins;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::mul_div_ceil;
use crate::{AccountId, Balance, RollappId, ValidatorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Escrow account holding gauge funds
pub const INCENTIVES_MODULE: &str = "module/incentives";

/// Account collecting gauge creation and top-up fees
pub const FEE_COLLECTOR: &str = "module/fee_collector";

pub trait FundsLedger {
    /// Move `coins` from an account into a module account. Fails on insufficient balance.
    fn send_to_module(
        &self,
        ctx: &mut Context<'_>,
        from: &str,
        module: &str,
        coins: &Coins,
    ) -> Result<()>;

    /// Move `coins` out of a module account. Fails on insufficient balance.
    fn send_from_module(
        &self,
        ctx: &mut Context<'_>,
        module: &str,
        to: &str,
        coins: &Coins,
    ) -> Result<()>;

    /// Whether any amount of `denom` exists.
    fn has_supply(&self, ctx: &Context<'_>, denom: &str) -> Result<bool>;

    fn balance(&self, ctx: &Context<'_>, account: &str) -> Result<Coins>;
}

/// Token lock owned by the lockup module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub id: u64,
    pub owner: AccountId,
    pub coins: Coins,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

pub trait LockView {
    /// Locks holding `denom` whose duration is at least `min_duration`.
    fn locks_longer_than(
        &self,
        ctx: &Context<'_>,
        denom: &str,
        min_duration: Duration,
    ) -> Result<Vec<Lock>>;
}

/// A delegator's bond to one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: AccountId,
    pub validator: ValidatorId,
    pub shares: Balance,
}

/// Validator pool: `tokens` backing `delegator_shares` outstanding shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub id: ValidatorId,
    pub tokens: Balance,
    pub delegator_shares: Balance,
}

impl Validator {
    /// Tokens represented by `shares`, rounded up to match the staking module.
    pub fn tokens_from_shares(&self, shares: Balance) -> Result<Balance> {
        if self.delegator_shares == 0 {
            if shares == 0 {
                return Ok(0);
            }
            return Err(Error::Corrupted(format!(
                "validator {} has delegations but no shares",
                self.id
            )));
        }
        mul_div_ceil(shares, self.tokens, self.delegator_shares)
    }
}

pub trait StakingView {
    fn delegations_of(&self, ctx: &Context<'_>, delegator: &str) -> Result<Vec<Delegation>>;

    fn delegation(
        &self,
        ctx: &Context<'_>,
        delegator: &str,
        validator: &str,
    ) -> Result<Option<Delegation>>;

    fn validator(&self, ctx: &Context<'_>, validator: &str) -> Result<Option<Validator>>;
}

pub trait RollappRegistry {
    fn rollapp_exists(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<bool>;

    /// Current owner; ownership may move between gauge creation and payout.
    fn rollapp_owner(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<Option<AccountId>>;

    fn bonded_sequencers(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<usize>;
}
