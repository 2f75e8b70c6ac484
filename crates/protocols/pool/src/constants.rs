//! Pool Constants
//!
//! Converter types, oracle window and fee bounds for standard pools.

use num_bigint::BigUint;

/// Converter type identifiers
pub mod converter_types {
    /// Pre-standard converter with a bonding-curve era interface
    pub const LEGACY: u16 = 1;

    /// Two-reserve 50/50 pool converter
    pub const STANDARD: u16 = 3;
}

/// Seconds over which the recent average rate decays toward the spot rate
pub const AVERAGE_RATE_PERIOD: u64 = 10 * 60;

/// Bit width of each stored average rate component
pub const AVERAGE_RATE_BITS: usize = 112;

/// Number of reserves held by a standard pool
pub const STANDARD_RESERVE_COUNT: usize = 2;

/// Upper bound of a stored average rate component (`2^112 - 1`)
pub fn max_average_rate_component() -> BigUint {
    amm_core::math::max_uint(AVERAGE_RATE_BITS)
}
