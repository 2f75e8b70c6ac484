//! Liquidity Protection State Types
//!
//! Positions, locked balances, liquidity change notifications and the
//! read-only previews returned by the engine.

use amm_core::{Address, PositionId, Timestamp, TokenId};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// A protected liquidity position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: PositionId,
    pub provider: Address,
    /// Anchor of the pool the liquidity sits in
    pub pool_token: TokenId,
    pub reserve_token: TokenId,
    /// Pool tokens attributed to the position
    pub pool_amount: BigUint,
    /// Reserve tokens the provider deposited
    pub reserve_amount: BigUint,
    /// Spot rate of the reserve token when the position was opened
    pub reserve_rate_n: BigUint,
    pub reserve_rate_d: BigUint,
    pub timestamp: Timestamp,
}

/// Network tokens held back from a provider until `expiration_time`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedBalance {
    pub amount: BigUint,
    pub expiration_time: Timestamp,
}

/// Notification sent to liquidity event subscribers.
///
/// Additions carry id 0 since the position does not exist yet when the
/// change is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityChange {
    pub id: PositionId,
    pub provider: Address,
    pub pool_anchor: TokenId,
    pub reserve_token: TokenId,
    pub pool_amount: BigUint,
    pub reserve_amount: BigUint,
    pub adding: bool,
}

/// Expected outcome of removing (a portion of) a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReturn {
    /// Reserve token value owed to the provider
    pub target_amount: BigUint,
    /// Part of the target paid in reserve tokens
    pub base_amount: BigUint,
    /// Network tokens making up the shortfall
    pub network_amount: BigUint,
}

/// Remaining single-sided deposit capacity of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSpace {
    pub base_token: BigUint,
    pub network_token: BigUint,
}
