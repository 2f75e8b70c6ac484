//! Recent average rate oracle
//!
//! Tracks a time-decayed rate of the second reserve in terms of the first.
//! The stored value blends linearly toward the spot rate over
//! [`AVERAGE_RATE_PERIOD`] and is refreshed at most once per timestamp.

use amm_core::math::{reduced_ratio, Rate};
use amm_core::Timestamp;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::constants::{max_average_rate_component, AVERAGE_RATE_PERIOD};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageRateRecord {
    pub n: BigUint,
    pub d: BigUint,
    /// Time of the last refresh; `0` means never refreshed
    pub updated_at: Timestamp,
}

impl Default for AverageRateRecord {
    fn default() -> Self {
        Self {
            n: BigUint::zero(),
            d: BigUint::zero(),
            updated_at: 0,
        }
    }
}

impl AverageRateRecord {
    /// Average of `balance1 / balance0` as seen at `now`
    ///
    /// Formula: n = prev.n * cur.d * (P - t) + prev.d * cur.n * t;
    /// d = P * prev.d * cur.d
    pub fn recent(&self, balance0: &BigUint, balance1: &BigUint, now: Timestamp) -> Rate {
        let current = Rate::new(balance1.clone(), balance0.clone());
        if self.updated_at == 0 {
            return current;
        }
        let elapsed = now.saturating_sub(self.updated_at);
        if elapsed == 0 {
            return Rate::new(self.n.clone(), self.d.clone());
        }
        if elapsed >= AVERAGE_RATE_PERIOD {
            return current;
        }

        let period = BigUint::from(AVERAGE_RATE_PERIOD);
        let elapsed = BigUint::from(elapsed);
        let remaining = &period - &elapsed;
        let n = &self.n * &current.d * remaining + &self.d * &current.n * elapsed;
        let d = &self.d * &current.d * period;
        Rate::new(n, d)
    }

    /// Refresh the record from the balances that held before the current
    /// operation. Returns whether the record changed.
    pub fn update(&mut self, balance0: &BigUint, balance1: &BigUint, now: Timestamp) -> bool {
        if self.updated_at == now || balance0.is_zero() || balance1.is_zero() {
            return false;
        }
        let rate = self.recent(balance0, balance1, now);
        let (n, d) = reduced_ratio(&rate.n, &rate.d, &max_average_rate_component());
        tracing::debug!(n = %n, d = %d, time = now, "Average rate updated");
        self.n = n;
        self.d = d;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u128) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_never_updated_reads_spot() {
        let record = AverageRateRecord::default();
        assert_eq!(record.recent(&big(1_000), &big(3_000), 50), Rate::new(3_000u32, 1_000u32));
    }

    #[test]
    fn test_zero_elapsed_returns_stored() {
        let mut record = AverageRateRecord::default();
        assert!(record.update(&big(1_000), &big(2_000), 100));
        // balances moved but no time passed
        let rate = record.recent(&big(1_000), &big(9_000), 100);
        assert_eq!(rate, Rate::new(record.n.clone(), record.d.clone()));
        assert!(rate.eq_value(&Rate::new(2u32, 1u32)));
    }

    #[test]
    fn test_full_period_returns_spot() {
        let mut record = AverageRateRecord::default();
        record.update(&big(1_000), &big(2_000), 100);
        let rate = record.recent(&big(1_000), &big(9_000), 100 + AVERAGE_RATE_PERIOD);
        assert_eq!(rate, Rate::new(9_000u32, 1_000u32));
    }

    #[test]
    fn test_linear_blend() {
        let mut record = AverageRateRecord::default();
        record.update(&big(1_000), &big(2_000), 100);
        // halfway through the window between 2 and 4
        let rate = record.recent(&big(1_000), &big(4_000), 100 + AVERAGE_RATE_PERIOD / 2);
        assert!(rate.eq_value(&Rate::new(3u32, 1u32)));
    }

    #[test]
    fn test_update_once_per_timestamp() {
        let mut record = AverageRateRecord::default();
        assert!(record.update(&big(1_000), &big(2_000), 100));
        assert!(!record.update(&big(1_000), &big(5_000), 100));
        assert_eq!(record.updated_at, 100);
        assert!(record.update(&big(1_000), &big(5_000), 101));
    }

    #[test]
    fn test_empty_pool_is_not_recorded() {
        let mut record = AverageRateRecord::default();
        assert!(!record.update(&big(0), &big(0), 100));
        assert_eq!(record.updated_at, 0);
    }

    #[test]
    fn test_stored_components_are_bounded() {
        let mut record = AverageRateRecord::default();
        let huge = big(u128::MAX) * big(u128::MAX);
        record.update(&huge, &big(3), 10);
        assert!(record.n <= max_average_rate_component());
        assert!(record.d <= max_average_rate_component());
    }
}
