//! Liquidity Protection Constants

pub use amm_core::constants::PPM_RESOLUTION;

/// Position ids start at one; zero never names a position
pub const FIRST_POSITION_ID: u64 = 1;

/// Minimum pool token return requested when the engine deposits into a pool
pub const MIN_POOL_TOKEN_RETURN: u32 = 1;
