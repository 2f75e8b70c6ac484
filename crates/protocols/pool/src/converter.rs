//! Converter variants
//!
//! One capability surface over every converter generation the network can
//! route through.

use amm_core::{Address, Result, Timestamp, TokenId, TokenService, Updated};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::constants::converter_types;
use crate::legacy::LegacyConverter;
use crate::settings::NetworkSettings;
use crate::standard::StandardPoolConverter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Converter {
    Legacy(LegacyConverter),
    Standard(StandardPoolConverter),
}

impl Converter {
    pub fn converter_type(&self) -> u16 {
        match self {
            Self::Legacy(_) => converter_types::LEGACY,
            Self::Standard(_) => converter_types::STANDARD,
        }
    }

    pub fn anchor(&self) -> &TokenId {
        match self {
            Self::Legacy(c) => c.anchor(),
            Self::Standard(c) => c.anchor(),
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            Self::Legacy(c) => c.address(),
            Self::Standard(c) => c.address(),
        }
    }

    pub fn owner(&self) -> &Address {
        match self {
            Self::Legacy(c) => c.ownership().owner(),
            Self::Standard(c) => c.ownership().owner(),
        }
    }

    pub fn reserve_tokens(&self) -> Vec<TokenId> {
        match self {
            Self::Legacy(c) => c.reserve_tokens(),
            Self::Standard(c) => c.reserve_tokens(),
        }
    }

    /// Conversion return and fee; legacy converters always report a zero fee
    pub fn get_return(
        &self,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
    ) -> Result<(BigUint, BigUint)> {
        match self {
            Self::Legacy(c) => c.get_return(source, target, amount),
            Self::Standard(c) => c.target_amount_and_fee(source, target, amount),
        }
    }

    pub fn reserve_balance(&self, token: &TokenId) -> Result<BigUint> {
        match self {
            Self::Legacy(c) => c.reserve_balance(token),
            Self::Standard(c) => c.reserve_balance(token),
        }
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        match self {
            Self::Legacy(c) => c.transfer_ownership(caller, new_owner),
            Self::Standard(c) => c.transfer_ownership(caller, new_owner),
        }
    }

    pub fn accept_ownership(&mut self, caller: &Address) -> Result<Updated<Address>> {
        match self {
            Self::Legacy(c) => c.accept_ownership(caller),
            Self::Standard(c) => c.accept_ownership(caller),
        }
    }

    /// Convert tokens already transferred to the converter; returns the
    /// amount sent to `beneficiary`
    #[allow(clippy::too_many_arguments)]
    pub fn convert(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
        beneficiary: &Address,
        now: Timestamp,
    ) -> Result<BigUint> {
        match self {
            Self::Legacy(c) => c.convert(tokens, source, target, amount, beneficiary, now),
            Self::Standard(c) => c
                .convert(tokens, settings, source, target, amount, beneficiary, now)
                .map(|conversion| conversion.target_amount),
        }
    }

    pub fn as_standard(&self) -> Option<&StandardPoolConverter> {
        match self {
            Self::Standard(c) => Some(c),
            Self::Legacy(_) => None,
        }
    }

    pub fn as_standard_mut(&mut self) -> Option<&mut StandardPoolConverter> {
        match self {
            Self::Standard(c) => Some(c),
            Self::Legacy(_) => None,
        }
    }
}

impl From<StandardPoolConverter> for Converter {
    fn from(converter: StandardPoolConverter) -> Self {
        Self::Standard(converter)
    }
}

impl From<LegacyConverter> for Converter {
    fn from(converter: LegacyConverter) -> Self {
        Self::Legacy(converter)
    }
}
