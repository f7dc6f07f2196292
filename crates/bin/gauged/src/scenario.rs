//! JSON scenario files: a start time and a list of steps replayed in order

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use gauge_incentives::coins::Coins;
use gauge_incentives::{App, Context, CreateGauge, Event, GaugeId, GaugeWeight};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub start: DateTime<Utc>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Mint { account: String, coins: Coins },
    Lock { owner: String, coins: Coins, duration_secs: u64 },
    CreateValidator { validator: String },
    Delegate { delegator: String, validator: String, amount: u128 },
    Undelegate { delegator: String, validator: String, shares: u128 },
    Redelegate { delegator: String, src: String, dst: String, shares: u128 },
    Slash { validator: String, bps: u32 },
    RegisterRollapp { rollapp_id: String, owner: String },
    SetSequencers { rollapp_id: String, count: usize },
    TransferRollapp { rollapp_id: String, owner: String },
    CreateGauge { owner: String, gauge: CreateGauge },
    AddToGauge { owner: String, gauge_id: GaugeId, coins: Coins },
    FundSponsored { funder: String, coins: Coins },
    Vote { voter: String, weights: Vec<GaugeWeight> },
    Revoke { voter: String },
    Claim { claimer: String, gauge_id: GaugeId },
    /// Move the clock forward and run the epoch tick
    Advance { secs: u64 },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse scenario {}", path.display()))
    }
}

/// Outcome of a replay
#[derive(Debug, Default)]
pub struct Replay {
    pub applied: usize,
    pub rejected: usize,
    pub events: Vec<Event>,
}

/// Replay every step. Rejected steps are logged and skipped; a fatal error
/// aborts the replay.
pub fn run(app: &App, ctx: &mut Context<'_>, scenario: &Scenario) -> Result<Replay> {
    let mut replay = Replay::default();
    app.init(ctx)?;
    app.tick(ctx)?;

    for (i, step) in scenario.steps.iter().enumerate() {
        match apply(app, ctx, step) {
            Ok(()) => replay.applied += 1,
            Err(e) if !e.is_fatal() => {
                warn!(step = i, ?step, "step rejected: {}", e);
                replay.rejected += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("step {} failed fatally", i)),
        }
        replay.events.extend(ctx.drain_events());
    }
    info!(
        applied = replay.applied,
        rejected = replay.rejected,
        events = replay.events.len(),
        "scenario replayed"
    );
    Ok(replay)
}

fn apply(app: &App, ctx: &mut Context<'_>, step: &Step) -> gauge_incentives::Result<()> {
    match step {
        Step::Mint { account, coins } => ctx.atomic(|ctx| app.bank.mint(ctx, account, coins)),
        Step::Lock { owner, coins, duration_secs } => ctx
            .atomic(|ctx| {
                app.lockup
                    .lock(ctx, &app.bank, owner, coins.clone(), Duration::from_secs(*duration_secs))
            })
            .map(drop),
        Step::CreateValidator { validator } => {
            ctx.atomic(|ctx| app.staking.create_validator(ctx, validator))
        }
        Step::Delegate { delegator, validator, amount } => {
            app.delegate(ctx, delegator, validator, *amount).map(drop)
        }
        Step::Undelegate { delegator, validator, shares } => {
            app.undelegate(ctx, delegator, validator, *shares).map(drop)
        }
        Step::Redelegate { delegator, src, dst, shares } => {
            app.redelegate(ctx, delegator, src, dst, *shares).map(drop)
        }
        Step::Slash { validator, bps } => app.slash(ctx, validator, *bps).map(drop),
        Step::RegisterRollapp { rollapp_id, owner } => {
            app.register_rollapp(ctx, rollapp_id, owner).map(drop)
        }
        Step::SetSequencers { rollapp_id, count } => {
            ctx.atomic(|ctx| app.rollapps.set_bonded_sequencers(ctx, rollapp_id, *count))
        }
        Step::TransferRollapp { rollapp_id, owner } => {
            ctx.atomic(|ctx| app.rollapps.transfer_ownership(ctx, rollapp_id, owner))
        }
        Step::CreateGauge { owner, gauge } => {
            app.incentives.create_gauge(ctx, owner, gauge.clone()).map(drop)
        }
        Step::AddToGauge { owner, gauge_id, coins } => app
            .incentives
            .add_to_gauge_rewards(ctx, owner, coins.clone(), *gauge_id),
        Step::FundSponsored { funder, coins } => {
            app.fund_sponsored_gauges(ctx, funder, coins).map(drop)
        }
        Step::Vote { voter, weights } => app.sponsorship.vote(ctx, voter, weights.clone()).map(drop),
        Step::Revoke { voter } => app.sponsorship.revoke_vote(ctx, voter).map(drop),
        Step::Claim { claimer, gauge_id } => app.sponsorship.claim(ctx, claimer, *gauge_id).map(drop),
        Step::Advance { secs } => {
            let next = chrono::Duration::from_std(Duration::from_secs(*secs))
                .ok()
                .and_then(|d| ctx.block_time().checked_add_signed(d))
                .ok_or(gauge_incentives::Error::Overflow("block time"))?;
            ctx.set_block_time(next);
            app.tick(ctx)
        }
    }
}
