//! Store-backed collaborators for local runs and tests
//!
//! These keep their state under a `local/` prefix of the same store the
//! keepers use, which means `Context::atomic` rolls them back too. They are
//! deliberately simple: no unbonding queues, no slashing history.

use crate::coins::Coins;
use crate::collaborators::{
    Delegation, FundsLedger, Lock, LockView, RollappRegistry, StakingView, Validator,
};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::mul_div_floor;
use crate::store::{get_record, keys, set_record};
use crate::{AccountId, Balance, RollappId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BALANCE_PREFIX: &[u8] = b"local/bank/bal/";
const SUPPLY_PREFIX: &[u8] = b"local/bank/supply/";
const LOCK_PREFIX: &[u8] = b"local/lock/id/";
const LAST_LOCK_ID: &[u8] = b"local/lock/last";
const VALIDATOR_PREFIX: &[u8] = b"local/staking/val/";
const DELEGATION_PREFIX: &[u8] = b"local/staking/del/";
const ROLLAPP_PREFIX: &[u8] = b"local/rollapp/";

/// Module account holding locked tokens
pub const LOCKUP_MODULE: &str = "module/lockup";

/// Bank keeping balances and per-denom supply in the store
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBank;

impl LocalBank {
    fn balance_key(account: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(BALANCE_PREFIX);
        keys::push_str(&mut key, account)?;
        Ok(key)
    }

    fn supply_key(denom: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(SUPPLY_PREFIX);
        keys::push_str(&mut key, denom)?;
        Ok(key)
    }

    /// Create new tokens on `account`.
    pub fn mint(&self, ctx: &mut Context<'_>, account: &str, coins: &Coins) -> Result<()> {
        for (denom, amount) in coins.iter() {
            let key = Self::supply_key(denom)?;
            let supply: Balance = get_record(ctx.store(), &key)?.unwrap_or(0);
            let supply = supply
                .checked_add(amount)
                .ok_or(Error::Overflow("supply"))?;
            set_record(ctx.store_mut(), &key, &supply)?;
        }
        let mut bal = self.balance(ctx, account)?;
        bal.add(coins)?;
        self.set_balance(ctx, account, &bal)
    }

    /// Move coins between two accounts.
    pub fn transfer(&self, ctx: &mut Context<'_>, from: &str, to: &str, coins: &Coins) -> Result<()> {
        let from_bal = self.balance(ctx, from)?;
        let left = from_bal
            .checked_sub(coins)
            .ok_or_else(|| Error::InsufficientFunds {
                account: from.to_string(),
                have: from_bal.to_string(),
                need: coins.to_string(),
            })?;
        self.set_balance(ctx, from, &left)?;
        let mut to_bal = self.balance(ctx, to)?;
        to_bal.add(coins)?;
        self.set_balance(ctx, to, &to_bal)
    }

    fn set_balance(&self, ctx: &mut Context<'_>, account: &str, coins: &Coins) -> Result<()> {
        let key = Self::balance_key(account)?;
        if coins.is_empty() {
            ctx.store_mut().delete(&key)
        } else {
            set_record(ctx.store_mut(), &key, coins)
        }
    }
}

impl FundsLedger for LocalBank {
    fn send_to_module(
        &self,
        ctx: &mut Context<'_>,
        from: &str,
        module: &str,
        coins: &Coins,
    ) -> Result<()> {
        self.transfer(ctx, from, module, coins)
    }

    fn send_from_module(
        &self,
        ctx: &mut Context<'_>,
        module: &str,
        to: &str,
        coins: &Coins,
    ) -> Result<()> {
        self.transfer(ctx, module, to, coins)
    }

    fn has_supply(&self, ctx: &Context<'_>, denom: &str) -> Result<bool> {
        let supply: Balance = get_record(ctx.store(), &Self::supply_key(denom)?)?.unwrap_or(0);
        Ok(supply > 0)
    }

    fn balance(&self, ctx: &Context<'_>, account: &str) -> Result<Coins> {
        Ok(get_record(ctx.store(), &Self::balance_key(account)?)?.unwrap_or_default())
    }
}

/// Lockup keeping locks in the store; locked coins sit on `LOCKUP_MODULE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLockup;

impl LocalLockup {
    fn lock_key(id: u64) -> Vec<u8> {
        let mut key = keys::prefixed(LOCK_PREFIX);
        keys::push_u64(&mut key, id);
        key
    }

    /// Lock `coins` of `owner` for `duration`, returning the lock id.
    pub fn lock(
        &self,
        ctx: &mut Context<'_>,
        bank: &LocalBank,
        owner: &str,
        coins: Coins,
        duration: Duration,
    ) -> Result<u64> {
        bank.transfer(ctx, owner, LOCKUP_MODULE, &coins)?;
        let id = get_record::<u64>(ctx.store(), LAST_LOCK_ID)?.unwrap_or(0) + 1;
        let lock = Lock {
            id,
            owner: owner.to_string(),
            coins,
            duration,
            created_at: ctx.block_time(),
        };
        set_record(ctx.store_mut(), &Self::lock_key(id), &lock)?;
        set_record(ctx.store_mut(), LAST_LOCK_ID, &id)?;
        Ok(id)
    }

    pub fn get_lock(&self, ctx: &Context<'_>, id: u64) -> Result<Option<Lock>> {
        get_record(ctx.store(), &Self::lock_key(id))
    }
}

impl LockView for LocalLockup {
    fn locks_longer_than(
        &self,
        ctx: &Context<'_>,
        denom: &str,
        min_duration: Duration,
    ) -> Result<Vec<Lock>> {
        let mut out = Vec::new();
        for (_, bytes) in ctx.store().prefix_scan(LOCK_PREFIX)? {
            let lock: Lock = crate::store::decode(&bytes)?;
            if lock.duration >= min_duration && lock.coins.amount_of(denom) > 0 {
                out.push(lock);
            }
        }
        Ok(out)
    }
}

/// Share-based staking pools kept in the store
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStaking;

impl LocalStaking {
    fn validator_key(id: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(VALIDATOR_PREFIX);
        keys::push_str(&mut key, id)?;
        Ok(key)
    }

    fn delegator_prefix(delegator: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(DELEGATION_PREFIX);
        keys::push_str(&mut key, delegator)?;
        Ok(key)
    }

    fn delegation_key(delegator: &str, validator: &str) -> Result<Vec<u8>> {
        let mut key = Self::delegator_prefix(delegator)?;
        keys::push_str(&mut key, validator)?;
        Ok(key)
    }

    pub fn create_validator(&self, ctx: &mut Context<'_>, id: &str) -> Result<()> {
        let v = Validator {
            id: id.to_string(),
            tokens: 0,
            delegator_shares: 0,
        };
        set_record(ctx.store_mut(), &Self::validator_key(id)?, &v)
    }

    fn load_validator(&self, ctx: &Context<'_>, id: &str) -> Result<Validator> {
        self.validator(ctx, id)?
            .ok_or_else(|| Error::ValidatorNotFound(id.to_string()))
    }

    fn save_delegation(&self, ctx: &mut Context<'_>, d: &Delegation) -> Result<()> {
        let key = Self::delegation_key(&d.delegator, &d.validator)?;
        if d.shares == 0 {
            ctx.store_mut().delete(&key)
        } else {
            set_record(ctx.store_mut(), &key, d)
        }
    }

    /// Bond `amount` tokens; returns the shares issued.
    pub fn delegate(
        &self,
        ctx: &mut Context<'_>,
        delegator: &str,
        validator: &str,
        amount: Balance,
    ) -> Result<Balance> {
        let mut v = self.load_validator(ctx, validator)?;
        let shares = if v.delegator_shares == 0 || v.tokens == 0 {
            amount
        } else {
            mul_div_floor(amount, v.delegator_shares, v.tokens)?
        };
        v.tokens = v.tokens.checked_add(amount).ok_or(Error::Overflow("tokens"))?;
        v.delegator_shares = v
            .delegator_shares
            .checked_add(shares)
            .ok_or(Error::Overflow("shares"))?;
        set_record(ctx.store_mut(), &Self::validator_key(validator)?, &v)?;

        let mut d = self
            .delegation(ctx, delegator, validator)?
            .unwrap_or(Delegation {
                delegator: delegator.to_string(),
                validator: validator.to_string(),
                shares: 0,
            });
        d.shares = d.shares.checked_add(shares).ok_or(Error::Overflow("shares"))?;
        self.save_delegation(ctx, &d)?;
        Ok(shares)
    }

    /// Burn `shares` of a delegation; returns the tokens released.
    pub fn undelegate(
        &self,
        ctx: &mut Context<'_>,
        delegator: &str,
        validator: &str,
        shares: Balance,
    ) -> Result<Balance> {
        let mut d = self.delegation(ctx, delegator, validator)?.ok_or_else(|| {
            Error::DelegationNotFound {
                delegator: delegator.to_string(),
                validator: validator.to_string(),
            }
        })?;
        if shares > d.shares {
            return Err(Error::Validation(format!(
                "undelegating {} shares, only {} held",
                shares, d.shares
            )));
        }
        let mut v = self.load_validator(ctx, validator)?;
        let tokens = mul_div_floor(shares, v.tokens, v.delegator_shares)?;
        v.tokens -= tokens;
        v.delegator_shares -= shares;
        set_record(ctx.store_mut(), &Self::validator_key(validator)?, &v)?;

        d.shares -= shares;
        self.save_delegation(ctx, &d)?;
        Ok(tokens)
    }

    /// Burn `fraction_bps` basis points of a validator's tokens.
    pub fn slash(&self, ctx: &mut Context<'_>, validator: &str, fraction_bps: u32) -> Result<Balance> {
        let mut v = self.load_validator(ctx, validator)?;
        let burned = mul_div_floor(v.tokens, fraction_bps.min(10_000) as Balance, 10_000)?;
        v.tokens -= burned;
        set_record(ctx.store_mut(), &Self::validator_key(validator)?, &v)?;
        Ok(burned)
    }
}

impl StakingView for LocalStaking {
    fn delegations_of(&self, ctx: &Context<'_>, delegator: &str) -> Result<Vec<Delegation>> {
        ctx.store()
            .prefix_scan(&Self::delegator_prefix(delegator)?)?
            .into_iter()
            .map(|(_, bytes)| crate::store::decode(&bytes))
            .collect()
    }

    fn delegation(
        &self,
        ctx: &Context<'_>,
        delegator: &str,
        validator: &str,
    ) -> Result<Option<Delegation>> {
        get_record(ctx.store(), &Self::delegation_key(delegator, validator)?)
    }

    fn validator(&self, ctx: &Context<'_>, validator: &str) -> Result<Option<Validator>> {
        get_record(ctx.store(), &Self::validator_key(validator)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RollappRecord {
    owner: AccountId,
    bonded_sequencers: usize,
}

/// Rollapp registry kept in the store
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRollapps;

impl LocalRollapps {
    fn key(id: &str) -> Result<Vec<u8>> {
        let mut key = keys::prefixed(ROLLAPP_PREFIX);
        keys::push_str(&mut key, id)?;
        Ok(key)
    }

    fn load(&self, ctx: &Context<'_>, id: &str) -> Result<RollappRecord> {
        get_record(ctx.store(), &Self::key(id)?)?
            .ok_or_else(|| Error::RollappNotFound(id.to_string()))
    }

    pub fn register(&self, ctx: &mut Context<'_>, id: &str, owner: &str) -> Result<()> {
        if ctx.store().has(&Self::key(id)?)? {
            return Err(Error::Validation(format!("rollapp {} already registered", id)));
        }
        let record = RollappRecord {
            owner: owner.to_string(),
            bonded_sequencers: 0,
        };
        set_record(ctx.store_mut(), &Self::key(id)?, &record)
    }

    pub fn transfer_ownership(&self, ctx: &mut Context<'_>, id: &str, new_owner: &str) -> Result<()> {
        let mut record = self.load(ctx, id)?;
        record.owner = new_owner.to_string();
        set_record(ctx.store_mut(), &Self::key(id)?, &record)
    }

    pub fn set_bonded_sequencers(&self, ctx: &mut Context<'_>, id: &str, n: usize) -> Result<()> {
        let mut record = self.load(ctx, id)?;
        record.bonded_sequencers = n;
        set_record(ctx.store_mut(), &Self::key(id)?, &record)
    }
}

impl RollappRegistry for LocalRollapps {
    fn rollapp_exists(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<bool> {
        ctx.store().has(&Self::key(rollapp_id)?)
    }

    fn rollapp_owner(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<Option<AccountId>> {
        Ok(get_record::<RollappRecord>(ctx.store(), &Self::key(rollapp_id)?)?.map(|r| r.owner))
    }

    fn bonded_sequencers(&self, ctx: &Context<'_>, rollapp_id: &RollappId) -> Result<usize> {
        Ok(get_record::<RollappRecord>(ctx.store(), &Self::key(rollapp_id)?)?
            .map(|r| r.bonded_sequencers)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[test]
    fn test_bank_rejects_overdraft() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());
        let bank = LocalBank;
        bank.mint(&mut ctx, "alice", &Coins::single("adym", 10)).unwrap();

        let err = bank
            .transfer(&mut ctx, "alice", "bob", &Coins::single("adym", 11))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        bank.transfer(&mut ctx, "alice", "bob", &Coins::single("adym", 4)).unwrap();
        assert_eq!(bank.balance(&ctx, "bob").unwrap(), Coins::single("adym", 4));
        assert!(bank.has_supply(&ctx, "adym").unwrap());
        assert!(!bank.has_supply(&ctx, "lp").unwrap());
    }

    #[test]
    fn test_staking_share_accounting() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());
        let staking = LocalStaking;
        staking.create_validator(&mut ctx, "val").unwrap();

        let shares = staking.delegate(&mut ctx, "alice", "val", 1_000).unwrap();
        assert_eq!(shares, 1_000);

        // a 10% slash lowers the token/share rate
        staking.slash(&mut ctx, "val", 1_000).unwrap();
        let v = staking.validator(&ctx, "val").unwrap().unwrap();
        assert_eq!(v.tokens, 900);
        assert_eq!(v.tokens_from_shares(shares).unwrap(), 900);

        let released = staking.undelegate(&mut ctx, "alice", "val", shares).unwrap();
        assert_eq!(released, 900);
        assert!(staking.delegation(&ctx, "alice", "val").unwrap().is_none());
        assert!(staking.delegations_of(&ctx, "alice").unwrap().is_empty());
    }

    #[test]
    fn test_lock_filters_by_denom_and_duration() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());
        let bank = LocalBank;
        let lockup = LocalLockup;
        bank.mint(&mut ctx, "alice", &Coins::single("lp", 100)).unwrap();

        lockup
            .lock(&mut ctx, &bank, "alice", Coins::single("lp", 10), Duration::from_secs(1))
            .unwrap();
        lockup
            .lock(&mut ctx, &bank, "alice", Coins::single("lp", 20), Duration::from_secs(60))
            .unwrap();

        let all = lockup.locks_longer_than(&ctx, "lp", Duration::from_secs(1)).unwrap();
        assert_eq!(all.len(), 2);
        let long = lockup.locks_longer_than(&ctx, "lp", Duration::from_secs(2)).unwrap();
        assert_eq!(long.len(), 1);
        assert!(lockup.locks_longer_than(&ctx, "adym", Duration::ZERO).unwrap().is_empty());
        assert_eq!(bank.balance(&ctx, LOCKUP_MODULE).unwrap(), Coins::single("lp", 30));
    }
}
