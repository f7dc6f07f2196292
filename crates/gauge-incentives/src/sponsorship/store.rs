//! sponsorship persistence
//!
//! layout under `sponsorship/`:
//! - `distribution` -> Distribution (singleton ledger)
//! - `vote/{voter}` -> Vote
//! - `power/{voter}{validator}` -> Power, last power applied for the pair
//! - `endorsement/{rollapp}` -> Endorsement
//! - `position/{voter}{rollapp}` -> EndorserPosition
//!
//! power snapshots are keyed voter-first so that revoking a vote clears them
//! with one prefix scan.

use super::endorsement::{Endorsement, EndorserPosition};
use super::{Distribution, Vote};
use crate::context::Context;
use crate::error::Result;
use crate::store::{decode, get_record, keys, set_record};
use crate::{AccountId, Power, ValidatorId};

const DISTRIBUTION: &[u8] = b"sponsorship/distribution";
const VOTE_PREFIX: &[u8] = b"sponsorship/vote/";
const POWER_PREFIX: &[u8] = b"sponsorship/power/";
const ENDORSEMENT_PREFIX: &[u8] = b"sponsorship/endorsement/";
const POSITION_PREFIX: &[u8] = b"sponsorship/position/";

fn vote_key(voter: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(VOTE_PREFIX);
    keys::push_str(&mut key, voter)?;
    Ok(key)
}

fn power_prefix(voter: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(POWER_PREFIX);
    keys::push_str(&mut key, voter)?;
    Ok(key)
}

fn power_key(voter: &str, validator: &str) -> Result<Vec<u8>> {
    let mut key = power_prefix(voter)?;
    keys::push_str(&mut key, validator)?;
    Ok(key)
}

fn endorsement_key(rollapp_id: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(ENDORSEMENT_PREFIX);
    keys::push_str(&mut key, rollapp_id)?;
    Ok(key)
}

fn position_key(voter: &str, rollapp_id: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(POSITION_PREFIX);
    keys::push_str(&mut key, voter)?;
    keys::push_str(&mut key, rollapp_id)?;
    Ok(key)
}

pub(crate) fn distribution(ctx: &Context<'_>) -> Result<Distribution> {
    Ok(get_record(ctx.store(), DISTRIBUTION)?.unwrap_or_default())
}

pub(crate) fn set_distribution(ctx: &mut Context<'_>, d: &Distribution) -> Result<()> {
    set_record(ctx.store_mut(), DISTRIBUTION, d)
}

pub(crate) fn vote(ctx: &Context<'_>, voter: &str) -> Result<Option<Vote>> {
    get_record(ctx.store(), &vote_key(voter)?)
}

pub(crate) fn set_vote(ctx: &mut Context<'_>, voter: &str, vote: &Vote) -> Result<()> {
    set_record(ctx.store_mut(), &vote_key(voter)?, vote)
}

pub(crate) fn delete_vote(ctx: &mut Context<'_>, voter: &str) -> Result<()> {
    ctx.store_mut().delete(&vote_key(voter)?)
}

pub(crate) fn votes(ctx: &Context<'_>) -> Result<Vec<(AccountId, Vote)>> {
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(VOTE_PREFIX)? {
        let (voter, _) = keys::read_str(&k, VOTE_PREFIX.len())?;
        out.push((voter, decode(&v)?));
    }
    Ok(out)
}

pub(crate) fn power(ctx: &Context<'_>, voter: &str, validator: &str) -> Result<Option<Power>> {
    get_record(ctx.store(), &power_key(voter, validator)?)
}

pub(crate) fn set_power(ctx: &mut Context<'_>, voter: &str, validator: &str, power: Power) -> Result<()> {
    set_record(ctx.store_mut(), &power_key(voter, validator)?, &power)
}

pub(crate) fn delete_power(ctx: &mut Context<'_>, voter: &str, validator: &str) -> Result<()> {
    ctx.store_mut().delete(&power_key(voter, validator)?)
}

/// Snapshots of one voter, by validator.
pub(crate) fn powers_of(ctx: &Context<'_>, voter: &str) -> Result<Vec<(ValidatorId, Power)>> {
    let prefix = power_prefix(voter)?;
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(&prefix)? {
        let (validator, _) = keys::read_str(&k, prefix.len())?;
        out.push((validator, decode(&v)?));
    }
    Ok(out)
}

pub(crate) fn delete_powers_of(ctx: &mut Context<'_>, voter: &str) -> Result<()> {
    for (validator, _) in powers_of(ctx, voter)? {
        delete_power(ctx, voter, &validator)?;
    }
    Ok(())
}

/// Every snapshot as (voter, validator, power).
pub(crate) fn all_powers(ctx: &Context<'_>) -> Result<Vec<(AccountId, ValidatorId, Power)>> {
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(POWER_PREFIX)? {
        let (voter, next) = keys::read_str(&k, POWER_PREFIX.len())?;
        let (validator, _) = keys::read_str(&k, next)?;
        out.push((voter, validator, decode(&v)?));
    }
    Ok(out)
}

pub(crate) fn endorsement(ctx: &Context<'_>, rollapp_id: &str) -> Result<Option<Endorsement>> {
    get_record(ctx.store(), &endorsement_key(rollapp_id)?)
}

pub(crate) fn set_endorsement(ctx: &mut Context<'_>, e: &Endorsement) -> Result<()> {
    set_record(ctx.store_mut(), &endorsement_key(&e.rollapp_id)?, e)
}

pub(crate) fn endorsements(ctx: &Context<'_>) -> Result<Vec<Endorsement>> {
    ctx.store()
        .prefix_scan(ENDORSEMENT_PREFIX)?
        .into_iter()
        .map(|(_, v)| decode(&v))
        .collect()
}

pub(crate) fn position(ctx: &Context<'_>, voter: &str, rollapp_id: &str) -> Result<Option<EndorserPosition>> {
    get_record(ctx.store(), &position_key(voter, rollapp_id)?)
}

pub(crate) fn set_position(
    ctx: &mut Context<'_>,
    voter: &str,
    rollapp_id: &str,
    p: &EndorserPosition,
) -> Result<()> {
    set_record(ctx.store_mut(), &position_key(voter, rollapp_id)?, p)
}

pub(crate) fn delete_position(ctx: &mut Context<'_>, voter: &str, rollapp_id: &str) -> Result<()> {
    ctx.store_mut().delete(&position_key(voter, rollapp_id)?)
}

/// Every endorser position as (voter, rollapp, position).
pub(crate) fn all_positions(ctx: &Context<'_>) -> Result<Vec<(AccountId, String, EndorserPosition)>> {
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(POSITION_PREFIX)? {
        let (voter, next) = keys::read_str(&k, POSITION_PREFIX.len())?;
        let (rollapp_id, _) = keys::read_str(&k, next)?;
        out.push((voter, rollapp_id, decode(&v)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[test]
    fn test_delete_powers_of_leaves_other_voters() {
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, Utc::now());
        set_power(&mut ctx, "alice", "val2", 20).unwrap();
        set_power(&mut ctx, "alice", "val1", 10).unwrap();
        // shares a byte prefix with "alice" but not a key prefix
        set_power(&mut ctx, "alicex", "val1", 5).unwrap();

        assert_eq!(
            powers_of(&ctx, "alice").unwrap(),
            vec![("val1".to_string(), 10), ("val2".to_string(), 20)]
        );

        delete_powers_of(&mut ctx, "alice").unwrap();
        assert!(powers_of(&ctx, "alice").unwrap().is_empty());
        assert_eq!(power(&ctx, "alicex", "val1").unwrap(), Some(5));
        assert_eq!(all_powers(&ctx).unwrap().len(), 1);
    }
}
