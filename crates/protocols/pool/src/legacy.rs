//! Legacy Converter
//!
//! Pre-standard converter kept for routing through older pools. It prices
//! cross-reserve conversions between equally weighted reserves, keeps no
//! average rate and pays no network fee. Its return query predates fee
//! reporting, so the fee always reads as zero.

use amm_core::{Address, Error, Ownable, Result, Timestamp, TokenId, TokenService, Updated};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::calculator::target_amount_and_fee;
use crate::standard::Reserve;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyConverter {
    anchor: TokenId,
    address: Address,
    ownership: Ownable,
    reserves: Vec<Reserve>,
    conversion_fee: u32,
}

impl LegacyConverter {
    pub fn new(
        anchor: TokenId,
        address: Address,
        owner: Address,
        reserves: Vec<(TokenId, u32)>,
        conversion_fee: u32,
    ) -> Result<Self> {
        if address.is_zero() {
            return Err(Error::InvalidAddress { address });
        }
        if let Some((_, weight)) = reserves.first() {
            if reserves.iter().any(|(_, w)| w != weight) {
                return Err(Error::InvalidItem(
                    "legacy converters require equal reserve weights".to_string(),
                ));
            }
        }
        let reserves = reserves
            .into_iter()
            .map(|(token, weight)| Reserve {
                token,
                balance: BigUint::zero(),
                weight,
            })
            .collect();
        Ok(Self {
            anchor,
            address,
            ownership: Ownable::new(owner),
            reserves,
            conversion_fee,
        })
    }

    pub fn anchor(&self) -> &TokenId {
        &self.anchor
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn reserve_tokens(&self) -> Vec<TokenId> {
        self.reserves.iter().map(|r| r.token.clone()).collect()
    }

    fn reserve(&self, token: &TokenId) -> Result<&Reserve> {
        self.reserves
            .iter()
            .find(|r| &r.token == token)
            .ok_or_else(|| Error::InvalidReserve {
                token: token.clone(),
            })
    }

    fn reserve_mut(&mut self, token: &TokenId) -> Result<&mut Reserve> {
        self.reserves
            .iter_mut()
            .find(|r| &r.token == token)
            .ok_or_else(|| Error::InvalidReserve {
                token: token.clone(),
            })
    }

    pub fn reserve_balance(&self, token: &TokenId) -> Result<BigUint> {
        Ok(self.reserve(token)?.balance.clone())
    }

    /// Conversion return net of the conversion fee; the fee reads as zero
    pub fn get_return(
        &self,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
    ) -> Result<(BigUint, BigUint)> {
        if source == target {
            return Err(Error::InvalidReserve {
                token: target.clone(),
            });
        }
        let (net, _) = target_amount_and_fee(
            &self.reserve(source)?.balance,
            &self.reserve(target)?.balance,
            amount,
            self.conversion_fee,
        );
        Ok((net, BigUint::zero()))
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        self.ownership.transfer_ownership(caller, new_owner)
    }

    pub fn accept_ownership(&mut self, caller: &Address) -> Result<Updated<Address>> {
        self.ownership.accept_ownership(caller)
    }

    /// Credit tokens already sent to the converter as reserve balance
    pub fn fund(&mut self, tokens: &dyn TokenService, caller: &Address) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        for reserve in self.reserves.iter_mut() {
            reserve.balance = tokens.balance_of(&reserve.token, &self.address);
        }
        Ok(())
    }

    /// Convert `amount` of `source` already transferred to this converter
    pub fn convert(
        &mut self,
        tokens: &mut dyn TokenService,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
        beneficiary: &Address,
        _now: Timestamp,
    ) -> Result<BigUint> {
        let (return_amount, _) = self.get_return(source, target, amount)?;
        let held = tokens.balance_of(source, &self.address);
        if held < &self.reserve(source)?.balance + amount {
            return Err(Error::InvalidAmount);
        }
        if !amount.is_zero() && return_amount.is_zero() {
            return Err(Error::ZeroTargetAmount);
        }
        self.reserve_mut(source)?.balance += amount;
        self.reserve_mut(target)?.balance -= &return_amount;
        tokens.transfer(target, &self.address, beneficiary, &return_amount)?;
        tracing::debug!(
            pool = %self.anchor,
            source = %source,
            target = %target,
            amount = %amount,
            return_amount = %return_amount,
            "Legacy conversion"
        );
        Ok(return_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_core::TokenLedger;

    fn big(v: u128) -> BigUint {
        BigUint::from(v)
    }

    fn legacy(ledger: &mut TokenLedger) -> LegacyConverter {
        let owner = Address::new("owner");
        let address = Address::new("legacy");
        let mut converter = LegacyConverter::new(
            TokenId::new("old-pool"),
            address.clone(),
            owner.clone(),
            vec![(TokenId::new("a"), 500_000), (TokenId::new("b"), 500_000)],
            1_000,
        )
        .unwrap();
        ledger.mint(&TokenId::new("a"), &address, &big(10_000)).unwrap();
        ledger.mint(&TokenId::new("b"), &address, &big(20_000)).unwrap();
        converter.fund(ledger, &owner).unwrap();
        converter
    }

    #[test]
    fn test_get_return_reports_zero_fee() {
        let mut ledger = TokenLedger::new();
        let converter = legacy(&mut ledger);
        let (amount, fee) = converter
            .get_return(&TokenId::new("a"), &TokenId::new("b"), &big(1_000))
            .unwrap();
        // gross 1818, fee 1 deducted but not reported
        assert_eq!(amount, big(1_817));
        assert!(fee.is_zero());
    }

    #[test]
    fn test_unequal_weights_rejected() {
        let result = LegacyConverter::new(
            TokenId::new("old-pool"),
            Address::new("legacy"),
            Address::new("owner"),
            vec![(TokenId::new("a"), 300_000), (TokenId::new("b"), 150_000)],
            0,
        );
        assert!(matches!(result, Err(Error::InvalidItem(_))));
    }

    #[test]
    fn test_convert() {
        let mut ledger = TokenLedger::new();
        let mut converter = legacy(&mut ledger);
        let trader = Address::new("trader");
        ledger.mint(&TokenId::new("a"), &trader, &big(1_000)).unwrap();
        ledger
            .transfer(&TokenId::new("a"), &trader, &Address::new("legacy"), &big(1_000))
            .unwrap();
        let out = converter
            .convert(&mut ledger, &TokenId::new("a"), &TokenId::new("b"), &big(1_000), &trader, 0)
            .unwrap();
        assert_eq!(out, big(1_817));
        assert_eq!(ledger.balance_of(&TokenId::new("b"), &trader), big(1_817));
        assert_eq!(converter.reserve_balance(&TokenId::new("a")).unwrap(), big(11_000));
    }
}
