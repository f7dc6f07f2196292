#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use gauge_incentives::coins::Coins;
use gauge_incentives::collaborators::{FundsLedger, StakingView};
use gauge_incentives::epochs::EpochInfo;
use gauge_incentives::{App, Config, Context, CreateGauge, DistributeTo, GaugeId, QueryCondition};
use std::time::Duration;

pub const FUNDER: &str = "dym1funder";
pub const DAY: Duration = Duration::from_secs(86_400);

pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn config() -> Config {
    Config {
        epochs: vec![EpochInfo::new("day", DAY, t(0))],
        ..Config::default()
    }
}

pub fn app() -> App {
    App::new(config())
}

/// Give `account` freshly minted coins.
pub fn fund(app: &App, ctx: &mut Context<'_>, account: &str, coins: Coins) {
    app.bank.mint(ctx, account, &coins).unwrap();
}

pub fn lock(app: &App, ctx: &mut Context<'_>, owner: &str, amount: u128, secs: u64) -> u64 {
    fund(app, ctx, owner, Coins::single("lp", amount));
    app.lockup
        .lock(ctx, &app.bank, owner, Coins::single("lp", amount), Duration::from_secs(secs))
        .unwrap()
}

/// Asset gauge over `lp` locks of at least one second, funded by `FUNDER`.
pub fn asset_gauge(
    app: &App,
    ctx: &mut Context<'_>,
    coins: Coins,
    is_perpetual: bool,
    num_epochs_paid_over: u64,
) -> GaugeId {
    fund(app, ctx, FUNDER, coins.clone());
    if !app.bank.has_supply(ctx, "lp").unwrap() {
        fund(app, ctx, "dym1lpminter", Coins::single("lp", 1));
    }
    let req = CreateGauge {
        is_perpetual,
        coins,
        distribute_to: DistributeTo::Asset(QueryCondition::new("lp", Duration::from_secs(1))),
        start_time: None,
        num_epochs_paid_over,
    };
    app.incentives.create_gauge(ctx, FUNDER, req).unwrap()
}

pub fn balance(app: &App, ctx: &Context<'_>, account: &str) -> Coins {
    app.bank.balance(ctx, account).unwrap()
}

/// Register a validator and bond `amount` from `delegator`.
pub fn delegate(app: &App, ctx: &mut Context<'_>, delegator: &str, validator: &str, amount: u128) {
    if app.staking.validator(ctx, validator).unwrap().is_none() {
        app.staking.create_validator(ctx, validator).unwrap();
    }
    app.delegate(ctx, delegator, validator, amount).unwrap();
}
