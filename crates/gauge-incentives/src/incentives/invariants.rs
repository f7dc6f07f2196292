//! Gauge engine invariants

use super::gauge::GaugeStatus;
use super::{store, Incentives};
use crate::context::Context;
use crate::error::Result;
use crate::invariant::Violation;
use std::collections::BTreeSet;

impl Incentives {
    /// Run every gauge check.
    pub fn check_invariants(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = self.check_gauge_balances(ctx)?;
        out.extend(self.check_indexes(ctx)?);
        out.extend(self.check_escrow(ctx)?);
        Ok(out)
    }

    /// `distributed <= coins` for every gauge, `filled <= num` for
    /// non-perpetual ones.
    pub fn check_gauge_balances(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        for gauge in store::all_gauges(ctx)? {
            if !gauge.distributed_coins.is_all_lte(&gauge.coins) {
                out.push(Violation::new(
                    "incentives/gauge-balance",
                    format!(
                        "gauge {} distributed {} out of {}",
                        gauge.id, gauge.distributed_coins, gauge.coins
                    ),
                ));
            }
            if !gauge.is_perpetual && gauge.filled_epochs > gauge.num_epochs_paid_over {
                out.push(Violation::new(
                    "incentives/gauge-epochs",
                    format!(
                        "gauge {} filled {} of {} epochs",
                        gauge.id, gauge.filled_epochs, gauge.num_epochs_paid_over
                    ),
                ));
            }
        }
        Ok(out)
    }

    /// Every gauge sits in exactly one status index, every index entry
    /// resolves, and only unfinished asset gauges are in the denom index.
    pub fn check_indexes(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let mut out = Vec::new();
        let gauges = store::all_gauges(ctx)?;
        let known: BTreeSet<u64> = gauges.iter().map(|g| g.id).collect();

        let mut indexed: BTreeSet<u64> = BTreeSet::new();
        let mut finished: BTreeSet<u64> = BTreeSet::new();
        for status in GaugeStatus::ALL {
            for id in store::ids_by_status(ctx, status)? {
                if !known.contains(&id) {
                    out.push(Violation::new(
                        "incentives/index",
                        format!("{} index references missing gauge {}", status, id),
                    ));
                }
                if !indexed.insert(id) {
                    out.push(Violation::new(
                        "incentives/index",
                        format!("gauge {} indexed under more than one status", id),
                    ));
                }
                if status == GaugeStatus::Finished {
                    finished.insert(id);
                }
            }
        }
        for id in known.difference(&indexed) {
            out.push(Violation::new(
                "incentives/index",
                format!("gauge {} is in no status index", id),
            ));
        }

        for (denom, id) in store::denom_refs(ctx)? {
            let ok = gauges
                .iter()
                .find(|g| g.id == id)
                .map_or(false, |g| g.asset_denom() == Some(&denom) && !finished.contains(&id));
            if !ok {
                out.push(Violation::new(
                    "incentives/denom-index",
                    format!("stale denom index entry {} -> {}", denom, id),
                ));
            }
        }
        Ok(out)
    }

    /// The escrow account holds at least what unfinished gauges still owe.
    pub fn check_escrow(&self, ctx: &Context<'_>) -> Result<Vec<Violation>> {
        let owed = self.module_to_distribute_coins(ctx)?;
        let held = self.escrow_balance(ctx)?;
        if owed.is_all_lte(&held) {
            return Ok(Vec::new());
        }
        Ok(vec![Violation::new(
            "incentives/escrow",
            format!("escrow holds {} but gauges owe {}", held, owed),
        )])
    }
}
