//! Integer helpers for pro-rata splits
//!
//! Products of two balances can exceed `u128`, so the intermediate value is
//! carried in a `BigUint`; only the quotient has to fit.

use crate::error::{Error, Result};
use crate::Balance;
use num_bigint::BigUint;

/// Fixed-point scale of the endorsement reward accumulator (18 decimals).
pub const ACC_PRECISION: u128 = 1_000_000_000_000_000_000;

/// floor(a * b / c)
pub fn mul_div_floor(a: Balance, b: Balance, c: Balance) -> Result<Balance> {
    if c == 0 {
        return Err(Error::Overflow("division by zero"));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / c);
    }
    let q = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    Balance::try_from(q).map_err(|_| Error::Overflow("mul_div_floor"))
}

/// ceil(a * b / c)
pub fn mul_div_ceil(a: Balance, b: Balance, c: Balance) -> Result<Balance> {
    if c == 0 {
        return Err(Error::Overflow("division by zero"));
    }
    let num = BigUint::from(a) * BigUint::from(b);
    let den = BigUint::from(c);
    let mut q = &num / &den;
    if &q * &den != num {
        q += 1u32;
    }
    Balance::try_from(q).map_err(|_| Error::Overflow("mul_div_ceil"))
}
