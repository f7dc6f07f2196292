//! Module parameters and node configuration
//!
//! Parameters are plain serde structs with production defaults. The gauged
//! binary loads a `Config` from JSON; tests build them in code.

use crate::error::{Error, Result};
use crate::epochs::EpochInfo;
use crate::{Balance, Denom, Power};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gauge engine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentivesParams {
    /// Epoch identifier whose end triggers a distribution pass
    pub distr_epoch_identifier: String,

    /// Lock durations an asset gauge may target
    pub lockable_durations: Vec<Duration>,

    /// Fee charged on gauge creation (in `fee_denom`)
    pub create_gauge_base_fee: Balance,

    /// Fee charged on every top-up (in `fee_denom`)
    pub add_to_gauge_base_fee: Balance,

    /// Extra fee per denom involved
    pub add_denom_fee: Balance,

    /// Denom the fees above are charged in
    pub fee_denom: Denom,
}

impl Default for IncentivesParams {
    fn default() -> Self {
        Self {
            distr_epoch_identifier: "day".to_string(),
            lockable_durations: vec![
                Duration::from_secs(1),
                Duration::from_secs(3_600),
                Duration::from_secs(86_400),
                Duration::from_secs(7 * 86_400),
            ],
            create_gauge_base_fee: 0,
            add_to_gauge_base_fee: 0,
            add_denom_fee: 0,
            fee_denom: "adym".to_string(),
        }
    }
}

impl IncentivesParams {
    pub fn validate(&self) -> Result<()> {
        if self.distr_epoch_identifier.is_empty() {
            return Err(Error::Validation("distribution epoch identifier is empty".into()));
        }
        if self.lockable_durations.is_empty() {
            return Err(Error::Validation("no lockable durations configured".into()));
        }
        if self.fee_denom.is_empty() {
            return Err(Error::Validation("fee denom is empty".into()));
        }
        Ok(())
    }

    /// Fee for creating a gauge funded with `num_denoms` denoms.
    pub fn create_fee(&self, num_denoms: usize) -> Result<Balance> {
        Self::fee(self.create_gauge_base_fee, self.add_denom_fee, num_denoms)
    }

    /// Fee for topping up a gauge; `num_denoms` counts added and existing denoms.
    pub fn add_fee(&self, num_denoms: usize) -> Result<Balance> {
        Self::fee(self.add_to_gauge_base_fee, self.add_denom_fee, num_denoms)
    }

    fn fee(base: Balance, per_denom: Balance, n: usize) -> Result<Balance> {
        per_denom
            .checked_mul(n as Balance)
            .and_then(|v| v.checked_add(base))
            .ok_or(Error::Overflow("gauge fee"))
    }
}

/// Sponsorship ledger parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipParams {
    /// Smallest share (in percent) a vote may give a gauge
    pub min_allocation_weight: u32,

    /// Voting power needed to hold a vote
    pub min_voting_power: Power,
}

impl Default for SponsorshipParams {
    fn default() -> Self {
        Self {
            min_allocation_weight: 1,
            min_voting_power: 1,
        }
    }
}

impl SponsorshipParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_allocation_weight > 100 {
            return Err(Error::Validation(format!(
                "min allocation weight {} exceeds 100",
                self.min_allocation_weight
            )));
        }
        if self.min_voting_power < 0 {
            return Err(Error::Validation("min voting power is negative".into()));
        }
        Ok(())
    }
}

/// Full configuration of a gauge node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub incentives: IncentivesParams,
    pub sponsorship: SponsorshipParams,
    pub epochs: Vec<EpochInfo>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Validation(format!("read config {}: {}", path.as_ref().display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::Validation(format!("parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.incentives.validate()?;
        self.sponsorship.validate()?;
        if !self
            .epochs
            .iter()
            .any(|e| e.identifier == self.incentives.distr_epoch_identifier)
            && !self.epochs.is_empty()
        {
            return Err(Error::Validation(format!(
                "no epoch named {}",
                self.incentives.distr_epoch_identifier
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.incentives.distr_epoch_identifier, "day");
    }

    #[test]
    fn test_fee_formula() {
        let params = IncentivesParams {
            create_gauge_base_fee: 10,
            add_to_gauge_base_fee: 5,
            add_denom_fee: 2,
            ..Default::default()
        };
        assert_eq!(params.create_fee(3).unwrap(), 16);
        assert_eq!(params.add_fee(1).unwrap(), 7);
    }

    #[test]
    fn test_json_partial_config() {
        let raw = r#"{ "sponsorship": { "min_allocation_weight": 10, "min_voting_power": 100 } }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.sponsorship.min_voting_power, 100);
        assert_eq!(config.incentives, IncentivesParams::default());
    }

    #[test]
    fn test_rejects_bad_weight() {
        let params = SponsorshipParams {
            min_allocation_weight: 101,
            min_voting_power: 0,
        };
        assert!(params.validate().is_err());
    }
}
