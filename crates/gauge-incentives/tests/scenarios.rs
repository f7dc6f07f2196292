//! End-to-end scenarios over the wired app and an in-memory store

mod common;

use common::*;
use gauge_incentives::coins::Coins;
use gauge_incentives::collaborators::INCENTIVES_MODULE;
use gauge_incentives::store::MemoryStore;
use gauge_incentives::{Context, Distribution, Event, GaugeStatus, GaugeWeight};

#[test]
fn test_asset_gauge_pays_pro_rata_by_lock_amount() {
    let mut store = MemoryStore::new();
    let mut ctx = Context::new(&mut store, t(0));
    let app = app();

    lock(&app, &mut ctx, "alice", 10, 1);
    lock(&app, &mut ctx, "bob", 5, 1);
    lock(&app, &mut ctx, "bob", 15, 60);

    let gauge_id = asset_gauge(&app, &mut ctx, Coins::single("adym", 300), true, 1);
    app.incentives.promote_upcoming(&mut ctx).unwrap();
    ctx.drain_events();

    let paid = app.incentives.distribute_active(&mut ctx).unwrap();
    assert_eq!(paid, Coins::single("adym", 300));
    assert_eq!(balance(&app, &ctx, "alice"), Coins::single("adym", 100));
    assert_eq!(balance(&app, &ctx, "bob"), Coins::single("adym", 200));

    // one transfer and one event per owner, not per lock
    let receivers: Vec<String> = ctx
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Distribution { receiver, .. } => Some(receiver),
            _ => None,
        })
        .collect();
    assert_eq!(receivers, vec!["alice".to_string(), "bob".to_string()]);

    let gauge = app.incentives.gauge_by_id(&ctx, gauge_id).unwrap().unwrap();
    assert_eq!(gauge.filled_epochs, 1);
    assert_eq!(gauge.distributed_coins, Coins::single("adym", 300));
    assert_eq!(app.incentives.gauge_status(&ctx, gauge_id).unwrap(), GaugeStatus::Active);
    assert!(app.check_invariants(&ctx).unwrap().is_empty());
}

#[test]
fn test_vote_splits_power_over_gauges() {
    let mut store = MemoryStore::new();
    let mut ctx = Context::new(&mut store, t(0));
    let app = app();

    let a = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    let b = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    let c = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    delegate(&app, &mut ctx, "voter", "val", 1_000_000);

    let weights = vec![GaugeWeight::new(a, 20), GaugeWeight::new(b, 50), GaugeWeight::new(c, 30)];
    let (vote, ledger) = app.sponsorship.vote(&mut ctx, "voter", weights).unwrap();

    assert_eq!(vote.voting_power, 1_000_000);
    assert_eq!(ledger.voting_power, 1_000_000);
    assert_eq!(ledger.power_of(a), 200_000);
    assert_eq!(ledger.power_of(b), 500_000);
    assert_eq!(ledger.power_of(c), 300_000);
    assert_eq!(
        app.sponsorship.delegator_validator_power(&ctx, "voter", "val").unwrap(),
        Some(1_000_000)
    );
    assert!(app.check_invariants(&ctx).unwrap().is_empty());
}

#[test]
fn test_full_undelegation_prunes_vote() {
    let mut store = MemoryStore::new();
    let mut ctx = Context::new(&mut store, t(0));
    let app = app();

    let a = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    let b = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    let c = asset_gauge(&app, &mut ctx, Coins::new(), true, 1);
    delegate(&app, &mut ctx, "voter", "val", 1_000_000);
    app.sponsorship
        .vote(
            &mut ctx,
            "voter",
            vec![GaugeWeight::new(a, 20), GaugeWeight::new(b, 50), GaugeWeight::new(c, 30)],
        )
        .unwrap();
    ctx.drain_events();

    app.undelegate_all(&mut ctx, "voter", "val").unwrap();

    assert_eq!(app.sponsorship.distribution(&ctx).unwrap(), Distribution::empty());
    assert!(!app.sponsorship.voted(&ctx, "voter").unwrap());
    assert_eq!(
        app.sponsorship.delegator_validator_power(&ctx, "voter", "val").unwrap(),
        None
    );
    let pruned = ctx.drain_events().into_iter().any(|e| {
        matches!(
            e,
            Event::VotingPowerUpdate {
                pruned: true,
                new_total: 0,
                diff: -1_000_000,
                ..
            }
        )
    });
    assert!(pruned);
    assert!(app.check_invariants(&ctx).unwrap().is_empty());
}

#[test]
fn test_fixed_length_gauge_finishes_after_its_epochs() {
    let mut store = MemoryStore::new();
    let mut ctx = Context::new(&mut store, t(0));
    let app = app();

    lock(&app, &mut ctx, "alice", 10, 1);
    let gauge_id = asset_gauge(&app, &mut ctx, Coins::single("adym", 100), false, 2);
    app.incentives.promote_upcoming(&mut ctx).unwrap();
    assert_eq!(app.incentives.gauges_for_denom(&ctx, "lp").unwrap().len(), 1);

    let gauge = app.incentives.gauge_by_id(&ctx, gauge_id).unwrap().unwrap();
    assert_eq!(app.incentives.distribute(&mut ctx, &[gauge.clone()]).unwrap(), Coins::single("adym", 50));
    assert_eq!(app.incentives.gauge_status(&ctx, gauge_id).unwrap(), GaugeStatus::Active);

    assert_eq!(app.incentives.distribute(&mut ctx, &[gauge.clone()]).unwrap(), Coins::single("adym", 50));
    let finished = app.incentives.gauge_by_id(&ctx, gauge_id).unwrap().unwrap();
    assert_eq!(finished.filled_epochs, 2);
    assert_eq!(app.incentives.gauge_status(&ctx, gauge_id).unwrap(), GaugeStatus::Finished);
    assert!(app.incentives.gauges_for_denom(&ctx, "lp").unwrap().is_empty());

    // a third pass is a no-op
    assert!(app.incentives.distribute(&mut ctx, &[gauge]).unwrap().is_empty());
    assert_eq!(app.incentives.gauge_by_id(&ctx, gauge_id).unwrap().unwrap(), finished);
    assert_eq!(balance(&app, &ctx, "alice"), Coins::single("adym", 100));
    assert!(balance(&app, &ctx, INCENTIVES_MODULE).is_empty());
    assert!(app.check_invariants(&ctx).unwrap().is_empty());
}

#[test]
fn test_epoch_boundary_activates_and_distributes() {
    let mut store = MemoryStore::new();
    let mut ctx = Context::new(&mut store, t(0));
    let app = app();
    app.init(&mut ctx).unwrap();
    app.tick(&mut ctx).unwrap();

    lock(&app, &mut ctx, "alice", 10, 1);
    let gauge_id = asset_gauge(&app, &mut ctx, Coins::single("adym", 90), false, 3);
    assert_eq!(app.incentives.gauge_status(&ctx, gauge_id).unwrap(), GaugeStatus::Upcoming);

    // mid-epoch: nothing happens
    ctx.set_block_time(t(3_600));
    app.tick(&mut ctx).unwrap();
    assert!(balance(&app, &ctx, "alice").is_empty());

    for day in 1..=3 {
        ctx.set_block_time(t(86_400 * day));
        app.tick(&mut ctx).unwrap();
        assert_eq!(
            balance(&app, &ctx, "alice"),
            Coins::single("adym", 30 * day as u128)
        );
    }
    assert_eq!(app.incentives.gauge_status(&ctx, gauge_id).unwrap(), GaugeStatus::Finished);
    assert_eq!(app.incentives.module_distributed_coins(&ctx).unwrap(), Coins::single("adym", 90));
    assert!(app.incentives.module_to_distribute_coins(&ctx).unwrap().is_empty());
}
