//! Gauge record and its lifecycle status

use crate::coins::Coins;
use crate::collaborators::Lock;
use crate::error::{Error, Result};
use crate::{Denom, GaugeId, RollappId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lock selection for asset gauges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub denom: Denom,

    /// Minimum lock duration
    pub duration: Duration,

    /// Minimum time since the lock was created; zero disables the check
    #[serde(default)]
    pub lock_age: Duration,
}

impl QueryCondition {
    pub fn new(denom: impl Into<Denom>, duration: Duration) -> Self {
        Self {
            denom: denom.into(),
            duration,
            lock_age: Duration::ZERO,
        }
    }

    pub fn matches(&self, lock: &Lock, now: DateTime<Utc>) -> bool {
        if lock.duration < self.duration || lock.coins.amount_of(&self.denom) == 0 {
            return false;
        }
        if self.lock_age.is_zero() {
            return true;
        }
        match chrono::Duration::from_std(self.lock_age) {
            Ok(age) => lock.created_at + age <= now,
            Err(_) => false,
        }
    }
}

/// Where a gauge pays out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributeTo {
    /// Pro-rata to lock holders matching the condition
    Asset(QueryCondition),

    /// Everything remaining, to the rollapp's current owner
    Rollapp { rollapp_id: RollappId },

    /// Per-epoch share credited to the rollapp's endorsers
    Endorsement { rollapp_id: RollappId },
}

impl DistributeTo {
    pub fn kind(&self) -> GaugeKind {
        match self {
            DistributeTo::Asset(_) => GaugeKind::Asset,
            DistributeTo::Rollapp { .. } => GaugeKind::Rollapp,
            DistributeTo::Endorsement { .. } => GaugeKind::Endorsement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaugeKind {
    Asset,
    Rollapp,
    Endorsement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GaugeStatus {
    Upcoming,
    Active,
    Finished,
}

impl GaugeStatus {
    pub const ALL: [GaugeStatus; 3] = [GaugeStatus::Upcoming, GaugeStatus::Active, GaugeStatus::Finished];

    pub(crate) fn key_byte(self) -> u8 {
        match self {
            GaugeStatus::Upcoming => 0,
            GaugeStatus::Active => 1,
            GaugeStatus::Finished => 2,
        }
    }
}

impl fmt::Display for GaugeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GaugeStatus::Upcoming => "upcoming",
            GaugeStatus::Active => "active",
            GaugeStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gauge {
    pub id: GaugeId,

    /// Perpetual gauges pay everything they hold each epoch and may be refilled
    pub is_perpetual: bool,

    pub distribute_to: DistributeTo,

    /// Total ever funded
    pub coins: Coins,

    /// Total ever paid out; never exceeds `coins`
    pub distributed_coins: Coins,

    pub start_time: DateTime<Utc>,

    /// Ignored for perpetual gauges
    pub num_epochs_paid_over: u64,

    pub filled_epochs: u64,
}

impl Gauge {
    /// Funded but not yet distributed
    pub fn remaining(&self) -> Result<Coins> {
        self.coins.checked_sub(&self.distributed_coins).ok_or_else(|| {
            Error::Corrupted(format!(
                "gauge {} distributed {} out of {}",
                self.id, self.distributed_coins, self.coins
            ))
        })
    }

    /// Epochs the remaining coins are spread over; 1 for perpetual gauges.
    pub fn remaining_epochs(&self) -> u64 {
        if self.is_perpetual {
            1
        } else {
            self.num_epochs_paid_over.saturating_sub(self.filled_epochs)
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        now < self.start_time
    }

    pub fn is_finished(&self) -> bool {
        !self.is_perpetual && self.filled_epochs >= self.num_epochs_paid_over
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_upcoming(now) && !self.is_finished()
    }

    pub fn kind(&self) -> GaugeKind {
        self.distribute_to.kind()
    }

    pub fn asset_denom(&self) -> Option<&Denom> {
        match &self.distribute_to {
            DistributeTo::Asset(cond) => Some(&cond.denom),
            _ => None,
        }
    }

    pub fn rollapp_id(&self) -> Option<&RollappId> {
        match &self.distribute_to {
            DistributeTo::Rollapp { rollapp_id } | DistributeTo::Endorsement { rollapp_id } => {
                Some(rollapp_id)
            }
            DistributeTo::Asset(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gauge(perpetual: bool, num: u64, filled: u64) -> Gauge {
        Gauge {
            id: 1,
            is_perpetual: perpetual,
            distribute_to: DistributeTo::Asset(QueryCondition::new("lp", Duration::from_secs(1))),
            coins: Coins::single("adym", 100),
            distributed_coins: Coins::new(),
            start_time: Utc.timestamp_opt(100, 0).unwrap(),
            num_epochs_paid_over: num,
            filled_epochs: filled,
        }
    }

    #[test]
    fn test_finished_rule() {
        assert!(!gauge(false, 2, 1).is_finished());
        assert!(gauge(false, 2, 2).is_finished());
        // perpetual gauges never finish
        assert!(!gauge(true, 0, 50).is_finished());
    }

    #[test]
    fn test_remaining_epochs() {
        assert_eq!(gauge(false, 5, 2).remaining_epochs(), 3);
        assert_eq!(gauge(true, 5, 2).remaining_epochs(), 1);
    }

    #[test]
    fn test_lock_age_filter() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let lock = Lock {
            id: 1,
            owner: "alice".into(),
            coins: Coins::single("lp", 10),
            duration: Duration::from_secs(60),
            created_at: Utc.timestamp_opt(900, 0).unwrap(),
        };
        let mut cond = QueryCondition::new("lp", Duration::from_secs(60));
        assert!(cond.matches(&lock, now));

        cond.lock_age = Duration::from_secs(200);
        assert!(!cond.matches(&lock, now));

        cond.lock_age = Duration::from_secs(100);
        assert!(cond.matches(&lock, now));

        let other = QueryCondition::new("adym", Duration::from_secs(1));
        assert!(!other.matches(&lock, now));
    }

    #[test]
    fn test_overdistributed_gauge_is_corrupt() {
        let mut g = gauge(false, 1, 0);
        g.distributed_coins = Coins::single("adym", 101);
        assert!(g.remaining().unwrap_err().is_fatal());
    }
}
