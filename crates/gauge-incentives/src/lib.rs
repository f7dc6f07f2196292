//! gauge-incentives: epoch-driven reward gauges and a stake-weighted
//! sponsorship ledger
//!
//! ## Architecture
//!
//! ```text
//!   epoch clock ──► incentives ──► distribution pass ──► funds ledger
//!                      ▲                  │
//!                      │ endorsement      ▼
//!                      │ payouts     rollapp owners / lock holders
//!   staking hooks ──► sponsorship ledger (Distribution, votes, snapshots)
//! ```
//!
//! - [`incentives`]: gauge store, lifecycle and the distribution engine
//! - [`sponsorship`]: distribution algebra, votes, staking hook sync,
//!   endorsement rewards
//! - [`store`]: ordered key-value stores with an atomic cache layer
//! - [`collaborators`]: the funds, lock, staking and rollapp views consumed
//! - [`local`]: store-backed collaborator implementations
//! - [`app`]: both keepers wired together
//!
//! Every state change runs inside [`Context::atomic`]: it either completes
//! or leaves no trace.

pub mod app;
pub mod coins;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod epochs;
pub mod error;
pub mod events;
pub mod incentives;
pub mod invariant;
pub mod local;
pub mod math;
pub mod sponsorship;
pub mod store;

pub use app::App;
pub use coins::{Coin, Coins};
pub use config::{Config, IncentivesParams, SponsorshipParams};
pub use context::Context;
pub use error::{Error, Result};
pub use events::Event;
pub use incentives::{CreateGauge, DistributeTo, Gauge, GaugeStatus, Incentives, QueryCondition};
pub use sponsorship::{Distribution, GaugeWeight, Sponsorship, Vote};

/// Account address
pub type AccountId = String;

/// Validator operator address
pub type ValidatorId = String;

pub type RollappId = String;

pub type Denom = String;

pub type GaugeId = u64;

/// Token amount
pub type Balance = u128;

/// Voting power; signed so that ledger updates can subtract
pub type Power = i128;
