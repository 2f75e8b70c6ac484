//! Error types for the pool converter and liquidity protection engine

use num_bigint::BigUint;
use thiserror::Error;

use crate::types::{Address, TokenId};

/// Errors surfaced by every mutating or querying operation.
///
/// Each variant maps to one protocol error code (see [`Error::error_code`]).
/// Nothing inside the core retries or swallows these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Amount must be greater than zero")]
    ZeroValue,

    #[error("Portion must be in the range (0, 1000000]")]
    InvalidPortion,

    #[error("Target time precedes the position timestamp")]
    InvalidTimestamp,

    #[error("Position {id} does not exist")]
    InvalidId { id: u64 },

    #[error("Access denied")]
    AccessDenied,

    #[error("Operation is not allowed in the same time unit as the deposit")]
    TooEarly,

    #[error("Pool {pool} is not whitelisted")]
    PoolNotWhitelisted { pool: TokenId },

    #[error("Pool {pool} is not supported")]
    PoolNotSupported { pool: TokenId },

    #[error("Adding liquidity is disabled for {reserve} in pool {pool}")]
    AddLiquidityDisabled { pool: TokenId, reserve: TokenId },

    #[error("Average rate deviates from the spot rate")]
    InvalidRate,

    #[error("Minting limit reached for pool {pool}")]
    MaxAmountReached { pool: TokenId },

    #[error("Not enough network token liquidity in pool {pool}")]
    NotEnoughLiquidity { pool: TokenId },

    #[error("Invalid address: {address}")]
    InvalidAddress { address: Address },

    #[error("Invalid index range")]
    InvalidIndices,

    #[error("Attached native value does not match the amount")]
    EthAmountMismatch,

    #[error("Subtraction overflow: {current} - {amount}")]
    SubtractionOverflow { current: BigUint, amount: BigUint },

    #[error("Invalid reserve: {token}")]
    InvalidReserve { token: TokenId },

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Target amount is zero")]
    ZeroTargetAmount,

    #[error("Return amount is lower than the requested minimum")]
    ReturnTooLow,

    #[error("Invalid network fee: {fee}")]
    InvalidFee { fee: u32 },

    #[error("Invalid conversion fee: {fee}")]
    InvalidConversionFee { fee: u32 },

    #[error("Insufficient balance of {token}: need {required}, have {available}")]
    InsufficientBalance {
        token: TokenId,
        required: BigUint,
        available: BigUint,
    },

    #[error("Insufficient allowance of {token}: need {required}, have {available}")]
    InsufficientAllowance {
        token: TokenId,
        required: BigUint,
        available: BigUint,
    },

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Invalid protection delays: min {min} must be below max {max}")]
    InvalidProtectionDelays { min: u64, max: u64 },

    #[error("Pool {pool} is already whitelisted")]
    AlreadyWhitelisted { pool: TokenId },

    #[error("Pool {pool} is not whitelisted")]
    NotWhitelisted { pool: TokenId },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Protocol error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroValue => "ERR_ZERO_VALUE",
            Self::InvalidPortion => "ERR_INVALID_PORTION",
            Self::InvalidTimestamp => "ERR_INVALID_TIMESTAMP",
            Self::InvalidId { .. } => "ERR_INVALID_ID",
            Self::AccessDenied => "ERR_ACCESS_DENIED",
            Self::TooEarly => "ERR_TOO_EARLY",
            Self::PoolNotWhitelisted { .. } => "ERR_POOL_NOT_WHITELISTED",
            Self::PoolNotSupported { .. } => "ERR_POOL_NOT_SUPPORTED",
            Self::AddLiquidityDisabled { .. } => "ERR_ADD_LIQUIDITY_DISABLED",
            Self::InvalidRate => "ERR_INVALID_RATE",
            Self::MaxAmountReached { .. } => "ERR_MAX_AMOUNT_REACHED",
            Self::NotEnoughLiquidity { .. } => "ERR_NOT_ENOUGH_LIQUIDITY",
            Self::InvalidAddress { .. } => "ERR_INVALID_ADDRESS",
            Self::InvalidIndices => "ERR_INVALID_INDICES",
            Self::EthAmountMismatch => "ERR_ETH_AMOUNT_MISMATCH",
            Self::SubtractionOverflow { .. } => "ERR_SUBTRACTION_OVERFLOW",
            Self::InvalidReserve { .. } => "ERR_INVALID_RESERVE",
            Self::InvalidAmount => "ERR_INVALID_AMOUNT",
            Self::ZeroTargetAmount => "ERR_ZERO_TARGET_AMOUNT",
            Self::ReturnTooLow => "ERR_RETURN_TOO_LOW",
            Self::InvalidFee { .. } => "ERR_INVALID_FEE",
            Self::InvalidConversionFee { .. } => "ERR_INVALID_CONVERSION_FEE",
            Self::InsufficientBalance { .. } => "ERR_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "ERR_INSUFFICIENT_ALLOWANCE",
            Self::InvalidItem(_) => "ERR_INVALID_ITEM",
            Self::InvalidProtectionDelays { .. } => "ERR_INVALID_PROTECTION_DELAYS",
            Self::AlreadyWhitelisted { .. } => "ERR_POOL_ALREADY_WHITELISTED",
            Self::NotWhitelisted { .. } => "ERR_POOL_NOT_WHITELISTED",
            Self::Config(_) => "ERR_CONFIG",
        }
    }

    /// Whether the error stems from the caller's permissions rather than state
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }
}

/// Checked subtraction that reports [`Error::SubtractionOverflow`] on underflow.
pub fn checked_sub(current: &BigUint, amount: &BigUint) -> Result<BigUint> {
    if amount > current {
        return Err(Error::SubtractionOverflow {
            current: current.clone(),
            amount: amount.clone(),
        });
    }
    Ok(current - amount)
}
