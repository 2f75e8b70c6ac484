//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account address (20 bytes, 0x-prefixed hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Build an address from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The zero address, never a valid recipient
    pub fn zero() -> Self {
        Self::from_bytes(&[0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        digits.chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token ID (contract address of an ERC20-style token, or a pool anchor)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// Sentinel id of the chain's native asset
    pub fn native() -> Self {
        Self(constants::NATIVE_TOKEN.to_string())
    }

    pub fn is_native(&self) -> bool {
        self.0.eq_ignore_ascii_case(constants::NATIVE_TOKEN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix time in seconds
pub type Timestamp = u64;

/// Protected position id; `0` is reserved for "new position" notifications
pub type PositionId = u64;

/// Old and new value of a counter or setting after an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updated<T> {
    pub previous: T,
    pub current: T,
}

impl<T> Updated<T> {
    pub fn new(previous: T, current: T) -> Self {
        Self { previous, current }
    }
}

/// Constants
pub mod constants {
    /// Parts-per-million resolution used for fees, weights and portions
    pub const PPM_RESOLUTION: u32 = 1_000_000;

    /// Reserve weight of each side of a standard pool
    pub const STANDARD_POOL_WEIGHT: u32 = PPM_RESOLUTION / 2;

    /// Address used to denote the native asset as a reserve
    pub const NATIVE_TOKEN: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

    pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        let zero = Address::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_str().len(), 42);
        assert!(!Address::from_bytes(&[1u8; 20]).is_zero());
    }

    #[test]
    fn test_native_token() {
        assert!(TokenId::native().is_native());
        assert!(TokenId::new("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee").is_native());
        assert!(!TokenId::from_bytes(&[0xab; 20]).is_native());
    }

    #[test]
    fn test_token_id_from_bytes() {
        let id = TokenId::from_bytes(&[0x0a, 0xff]);
        assert_eq!(id.to_string(), "0x0aff");
    }
}
