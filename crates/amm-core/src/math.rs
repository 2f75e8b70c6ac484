//! Rational math over unsigned big integers
//!
//! Every ratio is carried as an explicit `(n, d)` pair and only divided at the
//! very end of a computation. Square roots are integer Newton iterations.

use std::cmp::Ordering;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

/// A rate expressed as numerator / denominator.
///
/// Never reduced implicitly. `PartialEq` compares the raw pair; use
/// [`Rate::cmp_value`] or [`Rate::eq_value`] to compare the values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rate {
    pub n: BigUint,
    pub d: BigUint,
}

impl Rate {
    pub fn new(n: impl Into<BigUint>, d: impl Into<BigUint>) -> Self {
        Self {
            n: n.into(),
            d: d.into(),
        }
    }

    pub fn one() -> Self {
        Self::new(1u32, 1u32)
    }

    /// The reciprocal rate `d / n`
    pub fn inverse(&self) -> Self {
        Self {
            n: self.d.clone(),
            d: self.n.clone(),
        }
    }

    /// Compare by cross-multiplication
    pub fn cmp_value(&self, other: &Rate) -> Ordering {
        (&self.n * &other.d).cmp(&(&other.n * &self.d))
    }

    pub fn eq_value(&self, other: &Rate) -> bool {
        self.cmp_value(other) == Ordering::Equal
    }

    /// `amount * n / d`, floored
    pub fn apply(&self, amount: &BigUint) -> BigUint {
        amount * &self.n / &self.d
    }
}

impl From<(u128, u128)> for Rate {
    fn from((n, d): (u128, u128)) -> Self {
        Self::new(n, d)
    }
}

/// Largest integer whose square does not exceed `x`
pub fn floor_sqrt(x: &BigUint) -> BigUint {
    if x.is_zero() {
        return BigUint::zero();
    }
    let mut y = x.clone();
    let mut z: BigUint = x / 2u32 + 1u32;
    while z < y {
        y = z.clone();
        z = (x / &z + &z) / 2u32;
    }
    y
}

/// Smallest integer whose square is not below `x`
pub fn ceil_sqrt(x: &BigUint) -> BigUint {
    let y = floor_sqrt(x);
    if &(&y * &y) == x {
        y
    } else {
        y + 1u32
    }
}

/// `n / d` rounded half up
pub fn round_div(n: &BigUint, d: &BigUint) -> BigUint {
    let half_up = d - d / 2u32;
    n / d + (n % d) / half_up
}

/// `a * b / c`, floored
pub fn mul_div(a: &BigUint, b: &BigUint, c: &BigUint) -> BigUint {
    a * b / c
}

/// `a * b / c`, rounded up
pub fn mul_div_ceil(a: &BigUint, b: &BigUint, c: &BigUint) -> BigUint {
    let product = a * b;
    let q = &product / c;
    if (&q * c) == product {
        q
    } else {
        q + 1u32
    }
}

/// Reduce `n / d` so that neither component exceeds `max`.
///
/// Equal components collapse to `(1, 1)`.
pub fn reduced_ratio(n: &BigUint, d: &BigUint, max: &BigUint) -> (BigUint, BigUint) {
    let (new_n, new_d) = if n > max || d > max {
        normalized_ratio(n, d, max)
    } else {
        (n.clone(), d.clone())
    };
    if new_n != new_d {
        (new_n, new_d)
    } else {
        (BigUint::one(), BigUint::one())
    }
}

/// Scale `a / b` so that both components sum to `scale`
pub fn normalized_ratio(a: &BigUint, b: &BigUint, scale: &BigUint) -> (BigUint, BigUint) {
    if a <= b {
        accurate_ratio(a, b, scale)
    } else {
        let (y, x) = accurate_ratio(b, a, scale);
        (x, y)
    }
}

// assumes a <= b
fn accurate_ratio(a: &BigUint, b: &BigUint, scale: &BigUint) -> (BigUint, BigUint) {
    if a == b {
        let half = scale / 2u32;
        return (half.clone(), half);
    }
    let x = round_div(&(a * scale), &(a + b));
    let y = scale - &x;
    (x, y)
}

/// Number of decimal digits of `x`; zero has none
pub fn decimal_length(x: &BigUint) -> usize {
    if x.is_zero() {
        0
    } else {
        x.to_str_radix(10).len()
    }
}

/// Order-of-magnitude geometric mean: `10 ^ (round(avg digit count) - 1)`
pub fn geometric_mean(values: &[BigUint]) -> BigUint {
    if values.is_empty() {
        return BigUint::zero();
    }
    let digits: usize = values.iter().map(decimal_length).sum();
    let count = values.len();
    let exponent = (digits + count / 2) / count;
    if exponent == 0 {
        return BigUint::zero();
    }
    num_traits::pow(BigUint::from(10u32), exponent - 1)
}

/// `2^bits - 1`
pub fn max_uint(bits: usize) -> BigUint {
    (BigUint::one() << bits) - 1u32
}
