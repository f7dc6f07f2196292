//! Gauge engine
//!
//! Gauges are funded reward streams. They are created Upcoming, promoted to
//! Active once their start time passes, paid out at every distribution epoch,
//! and moved to Finished when a non-perpetual gauge runs out of epochs.
//!
//! Funds sit in the `INCENTIVES_MODULE` escrow account from creation until
//! payout.

mod asset;
mod distribute;
pub mod gauge;
pub mod invariants;
pub(crate) mod store;

pub use gauge::{DistributeTo, Gauge, GaugeKind, GaugeStatus, QueryCondition};

use crate::coins::Coins;
use crate::collaborators::{FundsLedger, LockView, RollappRegistry, FEE_COLLECTOR, INCENTIVES_MODULE};
use crate::config::IncentivesParams;
use crate::context::Context;
use crate::epochs::EpochHooks;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::{GaugeId, RollappId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Receiver of endorsement gauge payouts
pub trait EndorsementSink {
    /// Credit `coins` to the endorsers of `rollapp_id`.
    ///
    /// Returns `false` when the rollapp has no endorsers; the gauge is then
    /// skipped for this pass.
    fn add_endorsement_rewards(
        &self,
        ctx: &mut Context<'_>,
        rollapp_id: &RollappId,
        coins: &Coins,
    ) -> Result<bool>;
}

/// Request to create a gauge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGauge {
    pub is_perpetual: bool,
    pub coins: Coins,
    pub distribute_to: DistributeTo,

    /// Defaults to (and is clamped to) the block time
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Required for non-perpetual gauges
    #[serde(default)]
    pub num_epochs_paid_over: u64,
}

pub struct Incentives {
    params: IncentivesParams,
    bank: Arc<dyn FundsLedger>,
    locks: Arc<dyn LockView>,
    rollapps: Arc<dyn RollappRegistry>,
    endorsements: Option<Arc<dyn EndorsementSink>>,
}

impl Incentives {
    pub fn new(
        params: IncentivesParams,
        bank: Arc<dyn FundsLedger>,
        locks: Arc<dyn LockView>,
        rollapps: Arc<dyn RollappRegistry>,
    ) -> Self {
        Self {
            params,
            bank,
            locks,
            rollapps,
            endorsements: None,
        }
    }

    /// Route endorsement gauge payouts to `sink`.
    pub fn with_endorsement_sink(mut self, sink: Arc<dyn EndorsementSink>) -> Self {
        self.endorsements = Some(sink);
        self
    }

    pub fn params(&self) -> &IncentivesParams {
        &self.params
    }

    /// Create a gauge funded by `owner`, charging the creation fee.
    pub fn create_gauge(&self, ctx: &mut Context<'_>, owner: &str, req: CreateGauge) -> Result<GaugeId> {
        ctx.atomic(|ctx| {
            let fee = self.params.create_fee(req.coins.len())?;
            self.charge_fee(ctx, owner, fee)?;
            self.create_gauge_inner(ctx, owner, req)
        })
    }

    /// Shorthand for an endorsement gauge paying `rollapp_id`'s endorsers.
    pub fn create_endorsement_gauge(
        &self,
        ctx: &mut Context<'_>,
        owner: &str,
        rollapp_id: &RollappId,
        coins: Coins,
        start_time: Option<DateTime<Utc>>,
        num_epochs_paid_over: u64,
        is_perpetual: bool,
    ) -> Result<GaugeId> {
        let req = CreateGauge {
            is_perpetual,
            coins,
            distribute_to: DistributeTo::Endorsement {
                rollapp_id: rollapp_id.clone(),
            },
            start_time,
            num_epochs_paid_over,
        };
        self.create_gauge(ctx, owner, req)
    }

    /// Create the unfunded perpetual gauge of a rollapp. Called once, when the
    /// rollapp is registered.
    pub fn create_rollapp_gauge(&self, ctx: &mut Context<'_>, rollapp_id: &RollappId) -> Result<GaugeId> {
        ctx.atomic(|ctx| {
            if !self.rollapps.rollapp_exists(ctx, rollapp_id)? {
                return Err(Error::RollappNotFound(rollapp_id.clone()));
            }
            if let Some(existing) = store::rollapp_gauge_id(ctx, rollapp_id)? {
                return Err(Error::Validation(format!(
                    "rollapp {} already has gauge {}",
                    rollapp_id, existing
                )));
            }
            let gauge = Gauge {
                id: store::next_gauge_id(ctx)?,
                is_perpetual: true,
                distribute_to: DistributeTo::Rollapp {
                    rollapp_id: rollapp_id.clone(),
                },
                coins: Coins::new(),
                distributed_coins: Coins::new(),
                start_time: ctx.block_time(),
                num_epochs_paid_over: 1,
                filled_epochs: 0,
            };
            store::set_gauge(ctx, &gauge)?;
            store::add_status_ref(ctx, GaugeStatus::Upcoming, &gauge)?;
            store::set_rollapp_gauge(ctx, rollapp_id, gauge.id)?;
            ctx.emit(Event::GaugeCreated { gauge_id: gauge.id });
            info!(gauge_id = gauge.id, rollapp_id = %rollapp_id, "rollapp gauge created");
            Ok(gauge.id)
        })
    }

    fn create_gauge_inner(&self, ctx: &mut Context<'_>, owner: &str, req: CreateGauge) -> Result<GaugeId> {
        if !req.is_perpetual && req.num_epochs_paid_over == 0 {
            return Err(Error::Validation(
                "non-perpetual gauge must pay over at least one epoch".into(),
            ));
        }
        match &req.distribute_to {
            DistributeTo::Asset(cond) => {
                if !self.params.lockable_durations.contains(&cond.duration) {
                    return Err(Error::InvalidDuration(cond.duration));
                }
                if !self.bank.has_supply(ctx, &cond.denom)? {
                    return Err(Error::UnknownDenom(cond.denom.clone()));
                }
            }
            DistributeTo::Endorsement { rollapp_id } => {
                if !self.rollapps.rollapp_exists(ctx, rollapp_id)? {
                    return Err(Error::RollappNotFound(rollapp_id.clone()));
                }
            }
            DistributeTo::Rollapp { .. } => {
                return Err(Error::Validation(
                    "rollapp gauges are created together with their rollapp".into(),
                ));
            }
        }

        if !req.coins.is_empty() {
            self.bank.send_to_module(ctx, owner, INCENTIVES_MODULE, &req.coins)?;
        }

        let now = ctx.block_time();
        let start_time = req.start_time.map_or(now, |t| t.max(now));
        let gauge = Gauge {
            id: store::next_gauge_id(ctx)?,
            is_perpetual: req.is_perpetual,
            distribute_to: req.distribute_to,
            coins: req.coins,
            distributed_coins: Coins::new(),
            start_time,
            num_epochs_paid_over: if req.is_perpetual { 1 } else { req.num_epochs_paid_over },
            filled_epochs: 0,
        };
        store::set_gauge(ctx, &gauge)?;
        store::add_status_ref(ctx, GaugeStatus::Upcoming, &gauge)?;
        if let Some(denom) = gauge.asset_denom() {
            store::add_denom_ref(ctx, denom, gauge.id)?;
        }

        ctx.emit(Event::GaugeCreated { gauge_id: gauge.id });
        info!(
            gauge_id = gauge.id,
            kind = ?gauge.kind(),
            perpetual = gauge.is_perpetual,
            coins = %gauge.coins,
            "gauge created"
        );
        Ok(gauge.id)
    }

    /// Top up a gauge that has not finished yet.
    pub fn add_to_gauge_rewards(
        &self,
        ctx: &mut Context<'_>,
        owner: &str,
        coins: Coins,
        gauge_id: GaugeId,
    ) -> Result<()> {
        ctx.atomic(|ctx| {
            let mut gauge = store::must_get_gauge(ctx, gauge_id)?;
            if gauge.is_finished() || store::status_of(ctx, &gauge)? == Some(GaugeStatus::Finished) {
                return Err(Error::FinishedGauge(gauge_id));
            }
            let fee = self.params.add_fee(coins.len() + gauge.coins.len())?;
            self.charge_fee(ctx, owner, fee)?;
            self.add_rewards_unchecked(ctx, owner, &coins, &mut gauge)
        })
    }

    /// Escrow `coins` and credit them to `gauge` without charging a fee.
    pub(crate) fn add_rewards_unchecked(
        &self,
        ctx: &mut Context<'_>,
        owner: &str,
        coins: &Coins,
        gauge: &mut Gauge,
    ) -> Result<()> {
        if coins.is_empty() {
            return Ok(());
        }
        self.bank.send_to_module(ctx, owner, INCENTIVES_MODULE, coins)?;
        gauge.coins.add(coins)?;
        store::set_gauge(ctx, gauge)?;
        ctx.emit(Event::GaugeRewardsAdded {
            gauge_id: gauge.id,
            coins: coins.clone(),
        });
        debug!(gauge_id = gauge.id, coins = %coins, "gauge rewards added");
        Ok(())
    }

    fn charge_fee(&self, ctx: &mut Context<'_>, payer: &str, fee: u128) -> Result<()> {
        if fee == 0 {
            return Ok(());
        }
        let fee = Coins::single(self.params.fee_denom.clone(), fee);
        self.bank.send_to_module(ctx, payer, FEE_COLLECTOR, &fee)
    }

    /// Move every Upcoming gauge whose start time has passed to Active.
    pub fn promote_upcoming(&self, ctx: &mut Context<'_>) -> Result<Vec<GaugeId>> {
        ctx.atomic(|ctx| {
            let now = ctx.block_time();
            let mut promoted = Vec::new();
            for id in store::upcoming_started(ctx, now)? {
                let gauge = store::must_get_gauge(ctx, id)?;
                if store::move_status_ref(ctx, &gauge, GaugeStatus::Upcoming, GaugeStatus::Active)? {
                    ctx.emit(Event::GaugeActivated { gauge_id: id });
                    promoted.push(id);
                }
            }
            if !promoted.is_empty() {
                info!(count = promoted.len(), "gauges activated");
            }
            Ok(promoted)
        })
    }

    /// Move a gauge from Active to Finished and drop its denom index entry.
    fn finish_gauge(&self, ctx: &mut Context<'_>, gauge: &Gauge) -> Result<()> {
        store::move_status_ref(ctx, gauge, GaugeStatus::Active, GaugeStatus::Finished)?;
        if let Some(denom) = gauge.asset_denom() {
            store::remove_denom_ref(ctx, denom, gauge.id)?;
        }
        ctx.emit(Event::GaugeFinished { gauge_id: gauge.id });
        info!(
            gauge_id = gauge.id,
            distributed = %gauge.distributed_coins,
            "gauge finished"
        );
        Ok(())
    }

    // === queries ===

    pub fn gauge_by_id(&self, ctx: &Context<'_>, id: GaugeId) -> Result<Option<Gauge>> {
        store::get_gauge(ctx, id)
    }

    pub fn gauges(&self, ctx: &Context<'_>) -> Result<Vec<Gauge>> {
        store::all_gauges(ctx)
    }

    pub fn gauges_by_status(&self, ctx: &Context<'_>, status: GaugeStatus) -> Result<Vec<Gauge>> {
        store::gauges_by_status(ctx, status)
    }

    pub fn active_gauges(&self, ctx: &Context<'_>) -> Result<Vec<Gauge>> {
        store::gauges_by_status(ctx, GaugeStatus::Active)
    }

    /// Upcoming and active asset gauges paying lockers of `denom`
    pub fn gauges_for_denom(&self, ctx: &Context<'_>, denom: &str) -> Result<Vec<Gauge>> {
        store::gauges_for_denom(ctx, denom)
    }

    pub fn rollapp_gauge(&self, ctx: &Context<'_>, rollapp_id: &str) -> Result<Option<Gauge>> {
        match store::rollapp_gauge_id(ctx, rollapp_id)? {
            Some(id) => store::get_gauge(ctx, id),
            None => Ok(None),
        }
    }

    pub fn rollapp_gauges(&self, ctx: &Context<'_>) -> Result<Vec<Gauge>> {
        store::rollapp_gauge_ids(ctx)?
            .into_iter()
            .map(|id| store::must_get_gauge(ctx, id))
            .collect()
    }

    pub fn gauge_status(&self, ctx: &Context<'_>, id: GaugeId) -> Result<GaugeStatus> {
        let gauge = store::must_get_gauge(ctx, id)?;
        store::status_of(ctx, &gauge)?
            .ok_or_else(|| Error::Corrupted(format!("gauge {} is in no status index", id)))
    }

    /// Undistributed coins of every upcoming and active gauge
    pub fn module_to_distribute_coins(&self, ctx: &Context<'_>) -> Result<Coins> {
        let mut total = Coins::new();
        for status in [GaugeStatus::Upcoming, GaugeStatus::Active] {
            for gauge in store::gauges_by_status(ctx, status)? {
                total.add(&gauge.remaining()?)?;
            }
        }
        Ok(total)
    }

    /// Everything ever paid out by any gauge
    pub fn module_distributed_coins(&self, ctx: &Context<'_>) -> Result<Coins> {
        let mut total = Coins::new();
        for gauge in store::all_gauges(ctx)? {
            total.add(&gauge.distributed_coins)?;
        }
        Ok(total)
    }

    pub fn last_gauge_id(&self, ctx: &Context<'_>) -> Result<GaugeId> {
        store::last_gauge_id(ctx)
    }

    pub(crate) fn escrow_balance(&self, ctx: &Context<'_>) -> Result<Coins> {
        self.bank.balance(ctx, INCENTIVES_MODULE)
    }
}

impl EpochHooks for Incentives {
    /// On the distribution epoch: activate started gauges, then pay out every
    /// active gauge, as a single atomic step.
    fn after_epoch_end(&self, ctx: &mut Context<'_>, identifier: &str, epoch: u64) -> Result<()> {
        if identifier != self.params.distr_epoch_identifier {
            return Ok(());
        }
        ctx.atomic(|ctx| {
            self.promote_upcoming(ctx)?;
            let active = self.active_gauges(ctx)?;
            let paid = self.distribute(ctx, &active)?;
            info!(epoch, gauges = active.len(), paid = %paid, "epoch distribution");
            Ok(())
        })
    }
}
