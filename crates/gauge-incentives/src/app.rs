//! Wiring of both keepers over the local collaborators
//!
//! `App` is what the gauged binary and the integration tests drive. It routes
//! staking changes through the sponsorship hooks in the order the staking
//! module would call them, and epoch ticks to the gauge engine.

use crate::coins::Coins;
use crate::collaborators::StakingView;
use crate::config::Config;
use crate::context::Context;
use crate::epochs::EpochTracker;
use crate::error::{Error, Result};
use crate::incentives::{GaugeStatus, Incentives};
use crate::invariant::{self, Violation};
use crate::local::{LocalBank, LocalLockup, LocalRollapps, LocalStaking};
use crate::sponsorship::{Sponsorship, StakingHooks};
use crate::{Balance, GaugeId};
use std::sync::Arc;
use tracing::info;

pub struct App {
    pub bank: Arc<LocalBank>,
    pub lockup: Arc<LocalLockup>,
    pub staking: Arc<LocalStaking>,
    pub rollapps: Arc<LocalRollapps>,
    pub incentives: Incentives,
    pub sponsorship: Arc<Sponsorship>,
    pub epochs: EpochTracker,
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        let bank = Arc::new(LocalBank);
        let lockup = Arc::new(LocalLockup);
        let staking = Arc::new(LocalStaking);
        let rollapps = Arc::new(LocalRollapps);

        let sponsorship = Arc::new(Sponsorship::new(
            config.sponsorship.clone(),
            staking.clone(),
            rollapps.clone(),
            bank.clone(),
        ));
        let incentives = Incentives::new(
            config.incentives.clone(),
            bank.clone(),
            lockup.clone(),
            rollapps.clone(),
        )
        .with_endorsement_sink(sponsorship.clone());

        Self {
            bank,
            lockup,
            staking,
            rollapps,
            incentives,
            sponsorship,
            epochs: EpochTracker,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register the configured epochs.
    pub fn init(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.epochs.init(ctx, &self.config.epochs)
    }

    /// Advance epochs at the context's block time.
    pub fn tick(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.epochs.tick(ctx, &self.incentives)
    }

    // === staking, with hooks ===

    /// Bond `amount` to `validator`; returns the shares issued.
    pub fn delegate(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str, amount: Balance) -> Result<Balance> {
        ctx.atomic(|ctx| {
            let shares = self.staking.delegate(ctx, delegator, validator, amount)?;
            self.sponsorship.after_delegation_modified(ctx, delegator, validator)?;
            Ok(shares)
        })
    }

    /// Unbond `shares`; returns the tokens released.
    pub fn undelegate(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str, shares: Balance) -> Result<Balance> {
        ctx.atomic(|ctx| {
            let held = self
                .staking
                .delegation(ctx, delegator, validator)?
                .map(|d| d.shares)
                .ok_or_else(|| Error::DelegationNotFound {
                    delegator: delegator.to_string(),
                    validator: validator.to_string(),
                })?;
            if shares >= held {
                self.sponsorship.before_delegation_removed(ctx, delegator, validator)?;
                self.staking.undelegate(ctx, delegator, validator, held)
            } else {
                let tokens = self.staking.undelegate(ctx, delegator, validator, shares)?;
                self.sponsorship.after_delegation_modified(ctx, delegator, validator)?;
                Ok(tokens)
            }
        })
    }

    /// Unbond the whole delegation.
    pub fn undelegate_all(&self, ctx: &mut Context<'_>, delegator: &str, validator: &str) -> Result<Balance> {
        self.undelegate(ctx, delegator, validator, Balance::MAX)
    }

    /// Move `shares` from `src` to `dst`; returns the shares issued at `dst`.
    pub fn redelegate(
        &self,
        ctx: &mut Context<'_>,
        delegator: &str,
        src: &str,
        dst: &str,
        shares: Balance,
    ) -> Result<Balance> {
        ctx.atomic(|ctx| {
            let tokens = self.undelegate(ctx, delegator, src, shares)?;
            self.delegate(ctx, delegator, dst, tokens)
        })
    }

    /// Burn part of a validator's stake. No delegation hook fires.
    pub fn slash(&self, ctx: &mut Context<'_>, validator: &str, fraction_bps: u32) -> Result<Balance> {
        ctx.atomic(|ctx| self.staking.slash(ctx, validator, fraction_bps))
    }

    // === rollapps ===

    /// Register a rollapp together with its gauge.
    pub fn register_rollapp(&self, ctx: &mut Context<'_>, rollapp_id: &str, owner: &str) -> Result<GaugeId> {
        ctx.atomic(|ctx| {
            self.rollapps.register(ctx, rollapp_id, owner)?;
            self.incentives.create_rollapp_gauge(ctx, &rollapp_id.to_string())
        })
    }

    // === sponsored funding ===

    /// Split `coins` over the sponsored gauges pro-rata to ledger power and
    /// add each share to its gauge. Returns what each gauge received.
    pub fn fund_sponsored_gauges(&self, ctx: &mut Context<'_>, funder: &str, coins: &Coins) -> Result<Vec<(GaugeId, Coins)>> {
        ctx.atomic(|ctx| {
            let split = self.sponsorship.split_by_distribution(ctx, coins)?;
            for (gauge_id, share) in &split {
                let mut gauge = self
                    .incentives
                    .gauge_by_id(ctx, *gauge_id)?
                    .ok_or_else(|| Error::Corrupted(format!("ledger references missing gauge {}", gauge_id)))?;
                if self.incentives.gauge_status(ctx, *gauge_id)? == GaugeStatus::Finished {
                    return Err(Error::FinishedGauge(*gauge_id));
                }
                self.incentives.add_rewards_unchecked(ctx, funder, share, &mut gauge)?;
            }
            info!(funder, coins = %coins, gauges = split.len(), "sponsored gauges funded");
            Ok(split)
        })
    }

    /// Run every invariant check, including staking drift, and log what broke.
    pub fn check_invariants(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = self.incentives.check_invariants(ctx)?;
        out.extend(self.sponsorship.check_invariants(ctx)?);
        out.extend(self.sponsorship.check_staking_sync(ctx)?);
        Ok(invariant::report(out))
    }
}
