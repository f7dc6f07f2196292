//! error types for gauge-incentives
//!
//! two classes: validation errors reject an operation before anything is
//! written, fatal errors mean the store no longer matches its own invariants
//! and the enclosing step must be abandoned.

use crate::{Denom, GaugeId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // === validation ===
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("lock duration {0:?} is not a lockable duration")]
    InvalidDuration(std::time::Duration),

    #[error("denom does not exist: {0}")]
    UnknownDenom(Denom),

    #[error("rollapp not found: {0}")]
    RollappNotFound(String),

    #[error("rollapp {0} has no bonded sequencer")]
    NoBondedSequencer(String),

    #[error("gauge {0} does not exist")]
    GaugeNotFound(GaugeId),

    #[error("gauge {0} is not perpetual")]
    GaugeNotPerpetual(GaugeId),

    #[error("gauge {0} is already finished")]
    FinishedGauge(GaugeId),

    #[error("invalid vote weights: {0}")]
    InvalidWeights(String),

    #[error("gauge {gauge_id} weight {weight} is below the minimum allocation {min}")]
    WeightBelowMinimum { gauge_id: GaugeId, weight: u32, min: u32 },

    #[error("voting power {have} is less than the minimum {min}")]
    InsufficientPower { have: i128, min: i128 },

    #[error("insufficient funds on {account}: have {have}, need {need}")]
    InsufficientFunds {
        account: String,
        have: String,
        need: String,
    },

    #[error("voter {0} has no vote")]
    VoteNotFound(String),

    #[error("delegation {delegator} -> {validator} not found")]
    DelegationNotFound { delegator: String, validator: String },

    #[error("validator not found: {0}")]
    ValidatorNotFound(String),

    // === fatal ===
    #[error("store corrupted: {0}")]
    Corrupted(String),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),
}

impl Error {
    /// Whether the error signals store corruption rather than a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Corrupted(_) | Error::Codec(_) | Error::Storage(_) | Error::Overflow(_)
        )
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Storage(format!("sled: {}", err))
    }
}
