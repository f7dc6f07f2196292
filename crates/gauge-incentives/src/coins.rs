//! Multi-denom amounts
//!
//! `Coins` is an amount-map keyed by denom. Zero amounts are never stored, so
//! two `Coins` are equal exactly when they hold the same non-zero balances.

use crate::error::{Error, Result};
use crate::{Balance, Denom};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Single denom amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    pub amount: Balance,
}

impl Coin {
    pub fn new(denom: impl Into<Denom>, amount: Balance) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

/// Amount-map over denoms, sorted by denom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coins(BTreeMap<Denom, Balance>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from a list of coins, summing duplicates and dropping zeros.
    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Result<Self> {
        let mut out = Self::new();
        for coin in coins {
            out.add_amount(&coin.denom, coin.amount)?;
        }
        Ok(out)
    }

    /// Shorthand for a single-denom amount.
    pub fn single(denom: impl Into<Denom>, amount: Balance) -> Self {
        let mut map = BTreeMap::new();
        if amount > 0 {
            map.insert(denom.into(), amount);
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct denoms
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn amount_of(&self, denom: &str) -> Balance {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn denoms(&self) -> impl Iterator<Item = &Denom> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Denom, Balance)> {
        self.0.iter().map(|(d, a)| (d, *a))
    }

    pub fn to_vec(&self) -> Vec<Coin> {
        self.iter().map(|(d, a)| Coin::new(d.clone(), a)).collect()
    }

    pub fn add_amount(&mut self, denom: &str, amount: Balance) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.0.entry(denom.to_string()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(Error::Overflow("coin addition"))?;
        Ok(())
    }

    /// Add every denom of `other` into `self`.
    pub fn add(&mut self, other: &Coins) -> Result<()> {
        for (denom, amount) in other.iter() {
            self.add_amount(denom, amount)?;
        }
        Ok(())
    }

    /// Sum of `self` and `other` as a new value.
    pub fn plus(&self, other: &Coins) -> Result<Coins> {
        let mut out = self.clone();
        out.add(other)?;
        Ok(out)
    }

    /// Subtract `other`, failing if any denom would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let have = out.amount_of(denom);
            let left = have.checked_sub(amount)?;
            if left == 0 {
                out.0.remove(denom);
            } else {
                out.0.insert(denom.clone(), left);
            }
        }
        Some(out)
    }

    /// Coordinate-wise `self <= other`.
    pub fn is_all_lte(&self, other: &Coins) -> bool {
        self.iter().all(|(denom, amount)| amount <= other.amount_of(denom))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{}{}", a, d)).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromIterator<(Denom, Balance)> for Coins {
    fn from_iter<I: IntoIterator<Item = (Denom, Balance)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, a)| *a > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_amounts_dropped() {
        let coins = Coins::from_coins(vec![Coin::new("adym", 0), Coin::new("lp", 5)]).unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins, Coins::single("lp", 5));
        assert!(Coins::single("adym", 0).is_empty());
    }

    #[test]
    fn test_checked_sub() {
        let a: Coins = vec![("adym".to_string(), 10), ("lp".to_string(), 3)]
            .into_iter()
            .collect();
        let b = Coins::single("lp", 3);

        let diff = a.checked_sub(&b).unwrap();
        assert_eq!(diff, Coins::single("adym", 10));

        // going negative in any denom fails
        assert!(b.checked_sub(&a).is_none());
    }

    #[test]
    fn test_lte_is_coordinate_wise() {
        let small = Coins::single("adym", 5);
        let big: Coins = vec![("adym".to_string(), 5), ("lp".to_string(), 1)]
            .into_iter()
            .collect();
        assert!(small.is_all_lte(&big));
        assert!(!big.is_all_lte(&small));
        assert!(Coins::new().is_all_lte(&small));
    }

    #[test]
    fn test_display() {
        let coins: Coins = vec![("lp".to_string(), 2), ("adym".to_string(), 100)]
            .into_iter()
            .collect();
        assert_eq!(coins.to_string(), "100adym,2lp");
    }
}
