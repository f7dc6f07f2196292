//! Typed events emitted by state transitions
//!
//! Events are buffered on the `Context` and only surface to the caller once the
//! enclosing atomic step commits.

use crate::coins::Coins;
use crate::sponsorship::Distribution;
use crate::{AccountId, GaugeId, Power, RollappId, ValidatorId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GaugeCreated {
        gauge_id: GaugeId,
    },
    GaugeRewardsAdded {
        gauge_id: GaugeId,
        coins: Coins,
    },
    GaugeActivated {
        gauge_id: GaugeId,
    },
    GaugeFinished {
        gauge_id: GaugeId,
    },
    /// One per distinct recipient of a distribution pass
    Distribution {
        receiver: AccountId,
        amount: Coins,
    },
    Vote {
        voter: AccountId,
        voting_power: Power,
        distribution: Distribution,
    },
    RevokeVote {
        voter: AccountId,
        distribution: Distribution,
    },
    VotingPowerUpdate {
        voter: AccountId,
        validator: ValidatorId,
        diff: Power,
        new_total: Power,
        pruned: bool,
        distribution: Distribution,
    },
    EndorsementRewardsAdded {
        rollapp_id: RollappId,
        coins: Coins,
    },
    EndorsementClaimed {
        claimer: AccountId,
        rollapp_id: RollappId,
        rewards: Coins,
    },
}
