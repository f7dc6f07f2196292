//! Distribution algebra
//!
//! A `Distribution` is a total voting power plus a list of per-gauge powers,
//! sorted by gauge id with no duplicates and no zero entries. The three
//! operations here are pure; the ledger is only ever changed by merging.

use crate::error::{Error, Result};
use crate::{GaugeId, Power};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Share of a vote directed to one gauge, in whole percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeWeight {
    pub gauge_id: GaugeId,
    pub weight: u32,
}

impl GaugeWeight {
    pub fn new(gauge_id: GaugeId, weight: u32) -> Self {
        Self { gauge_id, weight }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugePower {
    pub gauge_id: GaugeId,
    pub power: Power,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Total voting power behind the distribution
    pub voting_power: Power,

    /// Per-gauge power, ascending by gauge id
    pub gauges: Vec<GaugePower>,
}

impl Distribution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.voting_power == 0 && self.gauges.is_empty()
    }

    pub fn power_of(&self, gauge_id: GaugeId) -> Power {
        self.gauges
            .binary_search_by_key(&gauge_id, |g| g.gauge_id)
            .map(|i| self.gauges[i].power)
            .unwrap_or(0)
    }

    /// Split `power` over `weights`, flooring each share.
    ///
    /// Weights for the same gauge are combined. Shares that floor to zero are
    /// left out.
    pub fn apply_weights(power: Power, weights: &[GaugeWeight]) -> Result<Self> {
        let mut sorted: Vec<GaugeWeight> = weights.to_vec();
        sorted.sort_by_key(|w| w.gauge_id);

        let mut gauges: Vec<GaugePower> = Vec::with_capacity(sorted.len());
        for w in sorted {
            let share = power
                .checked_mul(w.weight as Power)
                .ok_or(Error::Overflow("gauge power"))?
                .div_euclid(100);
            match gauges.last_mut() {
                Some(last) if last.gauge_id == w.gauge_id => {
                    last.power = last.power.checked_add(share).ok_or(Error::Overflow("gauge power"))?;
                }
                _ => gauges.push(GaugePower {
                    gauge_id: w.gauge_id,
                    power: share,
                }),
            }
        }
        gauges.retain(|g| g.power != 0);

        Ok(Self {
            voting_power: power,
            gauges,
        })
    }

    /// Two-pointer merge. Powers of equal gauges add up; zero results are dropped.
    pub fn merge(&self, other: &Distribution) -> Result<Distribution> {
        let (a, b) = (&self.gauges, &other.gauges);
        let mut gauges = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);

        while i < a.len() && j < b.len() {
            match a[i].gauge_id.cmp(&b[j].gauge_id) {
                Ordering::Less => {
                    gauges.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    gauges.push(b[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    let power = a[i]
                        .power
                        .checked_add(b[j].power)
                        .ok_or(Error::Overflow("gauge power"))?;
                    if power != 0 {
                        gauges.push(GaugePower {
                            gauge_id: a[i].gauge_id,
                            power,
                        });
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        gauges.extend_from_slice(&a[i..]);
        gauges.extend_from_slice(&b[j..]);

        let voting_power = self
            .voting_power
            .checked_add(other.voting_power)
            .ok_or(Error::Overflow("voting power"))?;
        Ok(Distribution { voting_power, gauges })
    }

    pub fn negate(&self) -> Distribution {
        Distribution {
            voting_power: -self.voting_power,
            gauges: self
                .gauges
                .iter()
                .map(|g| GaugePower {
                    gauge_id: g.gauge_id,
                    power: -g.power,
                })
                .collect(),
        }
    }

    /// Sum of all gauge powers
    pub fn allocated(&self) -> Power {
        self.gauges.iter().map(|g| g.power).sum()
    }

    /// Check the stored form: strictly ascending ids, no zero entries,
    /// nothing negative.
    pub fn validate(&self) -> Result<()> {
        if self.voting_power < 0 {
            return Err(Error::Corrupted(format!(
                "negative total voting power {}",
                self.voting_power
            )));
        }
        for pair in self.gauges.windows(2) {
            if pair[0].gauge_id >= pair[1].gauge_id {
                return Err(Error::Corrupted(format!(
                    "gauges not strictly ascending at {}",
                    pair[1].gauge_id
                )));
            }
        }
        if let Some(g) = self.gauges.iter().find(|g| g.power <= 0) {
            return Err(Error::Corrupted(format!(
                "gauge {} holds non-positive power {}",
                g.gauge_id, g.power
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn dist(total: Power, gauges: &[(GaugeId, Power)]) -> Distribution {
        Distribution {
            voting_power: total,
            gauges: gauges
                .iter()
                .map(|&(gauge_id, power)| GaugePower { gauge_id, power })
                .collect(),
        }
    }

    #[test]
    fn test_apply_weights_sorts_and_floors() {
        let weights = [GaugeWeight::new(3, 50), GaugeWeight::new(1, 30), GaugeWeight::new(2, 20)];
        let d = Distribution::apply_weights(101, &weights).unwrap();
        assert_eq!(d, dist(101, &[(1, 30), (2, 20), (3, 50)]));
        d.validate().unwrap();
    }

    #[test]
    fn test_apply_weights_negative_power() {
        let d = Distribution::apply_weights(-101, &[GaugeWeight::new(1, 50), GaugeWeight::new(2, 50)]).unwrap();
        assert_eq!(d, dist(-101, &[(1, -51), (2, -51)]));
    }

    #[test]
    fn test_merge_drops_zero_entries() {
        let a = dist(100, &[(1, 40), (2, 60)]);
        let b = dist(-40, &[(1, -40)]);
        assert_eq!(a.merge(&b).unwrap(), dist(60, &[(2, 60)]));
    }

    #[test]
    fn test_merge_interleaves() {
        let a = dist(10, &[(1, 5), (4, 5)]);
        let b = dist(20, &[(2, 10), (4, 3), (7, 7)]);
        assert_eq!(a.merge(&b).unwrap(), dist(30, &[(1, 5), (2, 10), (4, 8), (7, 7)]));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = dist(Power::MAX, &[(1, Power::MAX)]);
        let err = huge.merge(&dist(1, &[(1, 1)])).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
        assert!(matches!(
            Distribution::apply_weights(Power::MAX, &[GaugeWeight::new(1, 100)]),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        assert!(dist(10, &[(1, 5), (1, 5)]).validate().is_err());
        assert!(dist(10, &[(1, 0)]).validate().is_err());
        assert!(dist(-1, &[]).validate().is_err());
    }

    fn arb_distribution() -> impl Strategy<Value = Distribution> {
        (
            -1_000_000i128..1_000_000,
            proptest::collection::btree_map(0u64..16, -1_000_000i128..1_000_000, 0..8),
        )
            .prop_map(|(total, gauges): (Power, BTreeMap<GaugeId, Power>)| Distribution {
                voting_power: total,
                gauges: gauges
                    .into_iter()
                    .filter(|(_, p)| *p != 0)
                    .map(|(gauge_id, power)| GaugePower { gauge_id, power })
                    .collect(),
            })
    }

    fn arb_weights() -> impl Strategy<Value = Vec<GaugeWeight>> {
        // partition 100 into up to five distinct gauges
        (proptest::collection::btree_set(0u64..32, 1..6), any::<u64>()).prop_map(|(ids, seed)| {
            let ids: Vec<GaugeId> = ids.into_iter().collect();
            let mut left = 100u32;
            let mut out = Vec::with_capacity(ids.len());
            for (i, id) in ids.iter().enumerate() {
                let weight = if i + 1 == ids.len() {
                    left
                } else {
                    let cut = (seed.rotate_left(i as u32 * 7) % (left as u64 + 1)) as u32;
                    left -= cut;
                    cut
                };
                out.push(GaugeWeight::new(*id, weight));
            }
            out
        })
    }

    proptest! {
        #[test]
        fn prop_merge_commutative(a in arb_distribution(), b in arb_distribution()) {
            prop_assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        }

        #[test]
        fn prop_merge_associative(
            a in arb_distribution(),
            b in arb_distribution(),
            c in arb_distribution(),
        ) {
            prop_assert_eq!(
                a.merge(&b).unwrap().merge(&c).unwrap(),
                a.merge(&b.merge(&c).unwrap()).unwrap()
            );
        }

        #[test]
        fn prop_merge_identity_and_inverse(a in arb_distribution()) {
            prop_assert_eq!(a.merge(&Distribution::empty()).unwrap(), a.clone());
            prop_assert!(a.merge(&a.negate()).unwrap().is_empty());
        }

        #[test]
        fn prop_apply_weights_truncation_bound(power in 0i128..10_000_000_000, weights in arb_weights()) {
            let d = Distribution::apply_weights(power, &weights).unwrap();
            let lost = power - d.allocated();
            prop_assert!(lost >= 0);
            prop_assert!(lost <= weights.len() as Power - 1);
            prop_assert!(d.validate().is_ok());
        }
    }
}
