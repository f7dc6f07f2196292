//! gauge persistence
//!
//! layout under `incentives/`:
//! - `gauge/{id}` -> Gauge
//! - `time/{status}{start_time}` -> Vec<GaugeId>, ids sharing a start time
//! - `denom/{denom}` -> Vec<GaugeId>, asset gauges that are upcoming or active
//! - `rollapp/{rollapp_id}` -> GaugeId, the rollapp's own gauge
//! - `last_id` -> u64

use super::gauge::{Gauge, GaugeStatus};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::{decode, get_record, keys, set_record};
use crate::GaugeId;
use chrono::{DateTime, Utc};

const GAUGE_PREFIX: &[u8] = b"incentives/gauge/";
const TIME_PREFIX: &[u8] = b"incentives/time/";
const DENOM_PREFIX: &[u8] = b"incentives/denom/";
const ROLLAPP_PREFIX: &[u8] = b"incentives/rollapp/";
const LAST_ID: &[u8] = b"incentives/last_id";

fn gauge_key(id: GaugeId) -> Vec<u8> {
    let mut key = keys::prefixed(GAUGE_PREFIX);
    keys::push_u64(&mut key, id);
    key
}

fn status_prefix(status: GaugeStatus) -> Vec<u8> {
    let mut key = keys::prefixed(TIME_PREFIX);
    key.push(status.key_byte());
    key
}

fn time_key(status: GaugeStatus, start: &DateTime<Utc>) -> Vec<u8> {
    let mut key = status_prefix(status);
    keys::push_time(&mut key, start);
    key
}

fn denom_key(denom: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(DENOM_PREFIX);
    keys::push_str(&mut key, denom)?;
    Ok(key)
}

fn rollapp_key(rollapp_id: &str) -> Result<Vec<u8>> {
    let mut key = keys::prefixed(ROLLAPP_PREFIX);
    keys::push_str(&mut key, rollapp_id)?;
    Ok(key)
}

pub(crate) fn last_gauge_id(ctx: &Context<'_>) -> Result<GaugeId> {
    Ok(get_record(ctx.store(), LAST_ID)?.unwrap_or(0))
}

/// Reserve the next sequential id; ids start at 1.
pub(crate) fn next_gauge_id(ctx: &mut Context<'_>) -> Result<GaugeId> {
    let id = last_gauge_id(ctx)?
        .checked_add(1)
        .ok_or(Error::Overflow("gauge id"))?;
    set_record(ctx.store_mut(), LAST_ID, &id)?;
    Ok(id)
}

pub(crate) fn set_gauge(ctx: &mut Context<'_>, gauge: &Gauge) -> Result<()> {
    set_record(ctx.store_mut(), &gauge_key(gauge.id), gauge)
}

pub(crate) fn get_gauge(ctx: &Context<'_>, id: GaugeId) -> Result<Option<Gauge>> {
    get_record(ctx.store(), &gauge_key(id))
}

pub(crate) fn must_get_gauge(ctx: &Context<'_>, id: GaugeId) -> Result<Gauge> {
    get_gauge(ctx, id)?.ok_or(Error::GaugeNotFound(id))
}

/// Load a gauge an index points at; a dangling reference is corruption.
fn indexed_gauge(ctx: &Context<'_>, id: GaugeId) -> Result<Gauge> {
    get_gauge(ctx, id)?
        .ok_or_else(|| Error::Corrupted(format!("index references missing gauge {}", id)))
}

pub(crate) fn all_gauges(ctx: &Context<'_>) -> Result<Vec<Gauge>> {
    ctx.store()
        .prefix_scan(GAUGE_PREFIX)?
        .into_iter()
        .map(|(_, v)| decode(&v))
        .collect()
}

fn add_id(ctx: &mut Context<'_>, key: &[u8], id: GaugeId) -> Result<()> {
    let mut ids: Vec<GaugeId> = get_record(ctx.store(), key)?.unwrap_or_default();
    if !ids.contains(&id) {
        ids.push(id);
        set_record(ctx.store_mut(), key, &ids)?;
    }
    Ok(())
}

fn remove_id(ctx: &mut Context<'_>, key: &[u8], id: GaugeId) -> Result<bool> {
    let Some(mut ids) = get_record::<Vec<GaugeId>>(ctx.store(), key)? else {
        return Ok(false);
    };
    let before = ids.len();
    ids.retain(|g| *g != id);
    if ids.len() == before {
        return Ok(false);
    }
    if ids.is_empty() {
        ctx.store_mut().delete(key)?;
    } else {
        set_record(ctx.store_mut(), key, &ids)?;
    }
    Ok(true)
}

pub(crate) fn add_status_ref(ctx: &mut Context<'_>, status: GaugeStatus, gauge: &Gauge) -> Result<()> {
    add_id(ctx, &time_key(status, &gauge.start_time), gauge.id)
}

/// Move the time index entry between statuses. Moving a gauge that is not
/// under `from` is a no-op, which makes promotion idempotent.
pub(crate) fn move_status_ref(
    ctx: &mut Context<'_>,
    gauge: &Gauge,
    from: GaugeStatus,
    to: GaugeStatus,
) -> Result<bool> {
    if !remove_id(ctx, &time_key(from, &gauge.start_time), gauge.id)? {
        return Ok(false);
    }
    add_id(ctx, &time_key(to, &gauge.start_time), gauge.id)?;
    Ok(true)
}

/// Gauge ids under `status` in start-time order.
pub(crate) fn ids_by_status(ctx: &Context<'_>, status: GaugeStatus) -> Result<Vec<GaugeId>> {
    let mut out = Vec::new();
    for (_, v) in ctx.store().prefix_scan(&status_prefix(status))? {
        let ids: Vec<GaugeId> = decode(&v)?;
        out.extend(ids);
    }
    Ok(out)
}

pub(crate) fn gauges_by_status(ctx: &Context<'_>, status: GaugeStatus) -> Result<Vec<Gauge>> {
    ids_by_status(ctx, status)?
        .into_iter()
        .map(|id| indexed_gauge(ctx, id))
        .collect()
}

/// Upcoming ids whose start time is at or before `now`.
pub(crate) fn upcoming_started(ctx: &Context<'_>, now: DateTime<Utc>) -> Result<Vec<GaugeId>> {
    let upper = time_key(GaugeStatus::Upcoming, &now);
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(&status_prefix(GaugeStatus::Upcoming))? {
        if k > upper {
            break;
        }
        let ids: Vec<GaugeId> = decode(&v)?;
        out.extend(ids);
    }
    Ok(out)
}

pub(crate) fn status_of(ctx: &Context<'_>, gauge: &Gauge) -> Result<Option<GaugeStatus>> {
    for status in GaugeStatus::ALL {
        let ids: Option<Vec<GaugeId>> = get_record(ctx.store(), &time_key(status, &gauge.start_time))?;
        if ids.map_or(false, |ids| ids.contains(&gauge.id)) {
            return Ok(Some(status));
        }
    }
    Ok(None)
}

pub(crate) fn add_denom_ref(ctx: &mut Context<'_>, denom: &str, id: GaugeId) -> Result<()> {
    add_id(ctx, &denom_key(denom)?, id)
}

pub(crate) fn remove_denom_ref(ctx: &mut Context<'_>, denom: &str, id: GaugeId) -> Result<()> {
    remove_id(ctx, &denom_key(denom)?, id).map(|_| ())
}

pub(crate) fn gauges_for_denom(ctx: &Context<'_>, denom: &str) -> Result<Vec<Gauge>> {
    let ids: Vec<GaugeId> = get_record(ctx.store(), &denom_key(denom)?)?.unwrap_or_default();
    ids.into_iter().map(|id| indexed_gauge(ctx, id)).collect()
}

/// Every id referenced by the denom index, with its denom.
pub(crate) fn denom_refs(ctx: &Context<'_>) -> Result<Vec<(String, GaugeId)>> {
    let mut out = Vec::new();
    for (k, v) in ctx.store().prefix_scan(DENOM_PREFIX)? {
        let (denom, _) = keys::read_str(&k, DENOM_PREFIX.len())?;
        let ids: Vec<GaugeId> = decode(&v)?;
        out.extend(ids.into_iter().map(|id| (denom.clone(), id)));
    }
    Ok(out)
}

pub(crate) fn set_rollapp_gauge(ctx: &mut Context<'_>, rollapp_id: &str, id: GaugeId) -> Result<()> {
    set_record(ctx.store_mut(), &rollapp_key(rollapp_id)?, &id)
}

pub(crate) fn rollapp_gauge_id(ctx: &Context<'_>, rollapp_id: &str) -> Result<Option<GaugeId>> {
    get_record(ctx.store(), &rollapp_key(rollapp_id)?)
}

pub(crate) fn rollapp_gauge_ids(ctx: &Context<'_>) -> Result<Vec<GaugeId>> {
    ctx.store()
        .prefix_scan(ROLLAPP_PREFIX)?
        .into_iter()
        .map(|(_, v)| decode(&v))
        .collect()
}
